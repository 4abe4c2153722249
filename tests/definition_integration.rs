//! Integration tests for definition files and DDI codebooks.

use std::path::PathBuf;

use ipums_extract::ddi::FileStructure;
use ipums_extract::{
    Extract, IpumsError, define_extract_from_ddi, define_extract_from_json,
    define_extract_from_yaml, read_ipums_ddi, save_extract_as_json,
};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn assert_example_extract(extracts: &[Extract]) {
    assert_eq!(extracts.len(), 1);
    for extract in extracts {
        assert_eq!(extract.collection(), "usa");
        assert_eq!(extract.samples(), ["us2012b".to_string()]);
        assert_eq!(extract.variable_names(), vec!["AGE", "SEX", "RACE"]);
        assert_eq!(extract.description(), Some("Simple IPUMS extract"));
        assert!(!extract.is_submitted());
    }
}

#[test]
fn test_define_extract_from_yaml_fixture() {
    let extracts = define_extract_from_yaml(fixture("example_extract.yml")).unwrap();
    assert_example_extract(&extracts);
}

#[test]
fn test_define_extract_from_json_fixture() {
    let extracts = define_extract_from_json(fixture("example_extract.json")).unwrap();
    assert_example_extract(&extracts);
}

#[test]
fn test_save_extract_as_json_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("saved_extract.json");

    let extract = Extract::usa(["us2012b"], ["AGE", "SEX", "RACE"])
        .with_description("Simple IPUMS extract");
    save_extract_as_json(&extract, &path).unwrap();
    assert!(path.exists());

    let reloaded = define_extract_from_json(&path).unwrap();
    assert_example_extract(&reloaded);
    assert_eq!(reloaded[0].build(), extract.build());
}

#[test]
fn test_read_ipums_ddi_fixture() {
    let codebook = read_ipums_ddi(fixture("usa_00136.xml")).unwrap();

    assert_eq!(codebook.collection, "usa");
    assert_eq!(codebook.samples, ["us2012b".to_string()]);
    assert_eq!(codebook.file_structure, Some(FileStructure::Rectangular));
    assert_eq!(codebook.file_name.as_deref(), Some("usa_00136.dat"));

    let sex = codebook
        .variables
        .iter()
        .find(|v| v.name == "SEX")
        .unwrap();
    assert_eq!(sex.label.as_deref(), Some("Sex"));
    assert_eq!(sex.start, Some(57));
    assert_eq!(sex.width, Some(1));
}

#[test]
fn test_define_extract_from_ddi_fixture() {
    let codebook = read_ipums_ddi(fixture("usa_00136.xml")).unwrap();
    let extract = define_extract_from_ddi(&codebook).unwrap();

    assert_eq!(extract.collection(), "usa");
    assert_eq!(extract.samples(), ["us2012b".to_string()]);
    assert_eq!(
        extract.variable_names(),
        vec![
            "YEAR", "SAMPLE", "SERIAL", "CBSERIAL", "HHWT", "GQ", "PERNUM", "PERWT", "SEX", "AGE"
        ]
    );
    assert_eq!(extract.data_format(), Some("fixed_width"));
    assert!(extract.variables().iter().all(|v| v.is_preselected()));
    assert!(!extract.is_submitted());
}

#[test]
fn test_read_ipums_ddi_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = read_ipums_ddi(dir.path().join("missing.xml")).unwrap_err();
    assert!(matches!(err, IpumsError::Io { .. }), "got {err:?}");
}
