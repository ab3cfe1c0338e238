//! Serde records for the `multi_cactus` project file.
//!
//! Everything is optional here; required-field checks happen in
//! [`crate::project`] so they can report which field is missing.

use crate::error::ManifestError;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

pub const MANIFEST_ROOT_ELEMENT: &str = "multi_cactus";
pub const ATTR_INPUT_SEQUENCES: &str = "inputSequences";
pub const ATTR_INPUT_SEQUENCE_IDS: &str = "inputSequenceIDs";
pub const ATTR_OUTPUT_SEQUENCE_DIR: &str = "outputSequenceDir";
pub const ELEM_TREE: &str = "tree";
pub const ELEM_EXPERIMENT: &str = "cactus";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename = "multi_cactus")]
pub(crate) struct ProjectXml {
    #[serde(
        rename = "@inputSequences",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_sequences: Option<String>,
    #[serde(
        rename = "@inputSequenceIDs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_sequence_ids: Option<String>,
    #[serde(
        rename = "@outputSequenceDir",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_sequence_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
    #[serde(rename = "cactus", default)]
    pub experiments: Vec<ExperimentRefXml>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ExperimentRefXml {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@experiment_path", default)]
    pub experiment_path: Option<String>,
}

impl ProjectXml {
    pub fn from_xml_str(xml: &str, context: &str) -> Result<Self, ManifestError> {
        check_root_element(xml, context)?;
        quick_xml::de::from_str(xml).map_err(|e| ManifestError::parse(context, e))
    }

    pub fn to_xml_string(&self) -> Result<String, ManifestError> {
        let mut body = String::new();
        let mut ser = quick_xml::se::Serializer::new(&mut body);
        ser.indent(' ', 2);
        self.serialize(ser)
            .map_err(|e| ManifestError::Serialize(e.to_string()))?;
        Ok(format!("{XML_DECLARATION}\n{body}\n"))
    }
}

// The serde layer ignores the document element's name.
fn check_root_element(xml: &str, context: &str) -> Result<(), ManifestError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == MANIFEST_ROOT_ELEMENT.as_bytes() {
                    return Ok(());
                }
                return Err(ManifestError::parse(
                    context,
                    format!(
                        "expected root element '{MANIFEST_ROOT_ELEMENT}', found '{}'",
                        String::from_utf8_lossy(e.name().as_ref())
                    ),
                ));
            }
            // let the deserializer report empty documents
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(ManifestError::parse(context, e)),
        }
    }
}

/// Splits a whitespace-separated list attribute.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Returns the trimmed value, or `None` when it is absent or blank.
pub(crate) fn nonempty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_xml_reads_attributes_and_children() {
        let xml = r#"<?xml version="1.0" ?>
<multi_cactus inputSequences="a.fa  b.fa" outputSequenceDir="/out">
  <tree>(a,b)r;</tree>
  <cactus name="r" experiment_path="r/r_experiment.xml"/>
</multi_cactus>"#;
        let parsed = ProjectXml::from_xml_str(xml, "project").unwrap();
        assert_eq!(parsed.input_sequences.as_deref(), Some("a.fa  b.fa"));
        assert_eq!(parsed.input_sequence_ids, None);
        assert_eq!(parsed.output_sequence_dir.as_deref(), Some("/out"));
        assert_eq!(parsed.tree.as_deref().map(str::trim), Some("(a,b)r;"));
        assert_eq!(parsed.experiments.len(), 1);
        assert_eq!(parsed.experiments[0].name.as_deref(), Some("r"));
        assert_eq!(
            parsed.experiments[0].experiment_path.as_deref(),
            Some("r/r_experiment.xml")
        );
        assert_eq!(
            split_list(parsed.input_sequences.as_deref().unwrap()),
            vec!["a.fa", "b.fa"]
        );
    }

    #[test]
    fn test_project_xml_written_form() {
        let record = ProjectXml {
            input_sequences: Some("a.fa b.fa".to_string()),
            input_sequence_ids: None,
            output_sequence_dir: Some("/out".to_string()),
            tree: Some("(a,b)r;".to_string()),
            experiments: vec![ExperimentRefXml {
                name: Some("r".to_string()),
                experiment_path: Some("r.xml".to_string()),
            }],
        };
        let text = record.to_xml_string().unwrap();
        assert!(text.starts_with(XML_DECLARATION));
        assert!(text.contains(MANIFEST_ROOT_ELEMENT));
        assert!(text.contains(r#"inputSequences="a.fa b.fa""#));
        assert!(!text.contains(ATTR_INPUT_SEQUENCE_IDS));
        assert!(text.contains("<tree>(a,b)r;</tree>"));
        assert!(text.contains(r#"<cactus name="r" experiment_path="r.xml"/>"#));

        let reparsed = ProjectXml::from_xml_str(&text, "project").unwrap();
        assert_eq!(reparsed.tree.as_deref(), Some("(a,b)r;"));
        assert_eq!(reparsed.experiments.len(), 1);
    }

    #[test]
    fn test_project_xml_collects_experiments_around_tree() {
        let xml = r#"<multi_cactus inputSequences="a.fa b.fa" outputSequenceDir="/out">
  <cactus name="r" experiment_path="r.xml"/>
  <tree>((a,b)x,c)r;</tree>
  <cactus name="x" experiment_path="x.xml"/>
</multi_cactus>"#;
        let parsed = ProjectXml::from_xml_str(xml, "project").unwrap();
        assert_eq!(parsed.tree.as_deref(), Some("((a,b)x,c)r;"));
        let names: Vec<_> = parsed
            .experiments
            .iter()
            .filter_map(|e| e.name.as_deref())
            .collect();
        assert_eq!(names, vec!["r", "x"]);
    }

    #[test]
    fn test_project_xml_checks_root_element() {
        let err = ProjectXml::from_xml_str(
            r#"<?xml version="1.0" ?><!-- note --><bogus outputSequenceDir="/out"/>"#,
            "project",
        )
        .unwrap_err();
        assert!(err.to_string().contains("found 'bogus'"));
        assert!(ProjectXml::from_xml_str("<multi_cactus/>", "project").is_ok());
    }

    #[test]
    fn test_project_xml_rejects_malformed_text() {
        let err = ProjectXml::from_xml_str("<multi_cactus><tree>", "project").unwrap_err();
        assert!(err.to_string().starts_with("Malformed project"));
    }
}
