//! Curriculum and textbook data model.
//!
//! Both record kinds are write-once per ingestion and read-only afterwards.
//! The persisted JSON shapes are parsed here; the resolution engine in
//! `lessonctx-core` never mutates them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LessonCtxError, Result};
use crate::keys::{BookType, TreeShape};

// ---------------------------------------------------------------------------
// Curriculum node contents
// ---------------------------------------------------------------------------

/// A request for specific pages of one textbook category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReference {
    pub book_type: BookType,
    #[serde(default)]
    pub book_name: String,
    /// Requested page numbers, not necessarily contiguous.
    #[serde(default)]
    pub pages: Vec<u32>,
}

/// An audio track or video attached to a curriculum node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResource {
    pub title: String,
    /// `video` or `audio`; anything else is kept but never resolves.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// URL for video, track number for audio.
    #[serde(default)]
    pub reference: String,
}

/// One pedagogical lesson type within a lesson (or flat unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPlanTypeEntry {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub student_learning_outcomes: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub learning_strategies: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub book_references: Vec<BookReference>,
    #[serde(default)]
    pub external_resources: Vec<ExternalResource>,
}

// ---------------------------------------------------------------------------
// Curriculum tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    #[serde(default)]
    pub lesson_title: String,
    #[serde(default)]
    pub lesson_plan_types: Vec<LessonPlanTypeEntry>,
}

/// Unit of a hierarchical (English) curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalUnit {
    pub unit_number: u32,
    #[serde(default)]
    pub unit_title: String,
    pub lessons: Vec<Lesson>,
}

/// Unit of a flat (Mathematics) curriculum; the unit is the addressable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatUnit {
    pub unit_number: u32,
    #[serde(default)]
    pub unit_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default)]
    pub lesson_plan_types: Vec<LessonPlanTypeEntry>,
}

/// Scheme of work for one (subject, grade) pair.
///
/// Unit and lesson order is insertion order and carries no meaning beyond
/// first-match tie breaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurriculumTree {
    Hierarchical(Vec<HierarchicalUnit>),
    Flat(Vec<FlatUnit>),
}

impl CurriculumTree {
    pub fn shape(&self) -> TreeShape {
        match self {
            Self::Hierarchical(_) => TreeShape::Hierarchical,
            Self::Flat(_) => TreeShape::Flat,
        }
    }

    /// Number of addressable nodes (lessons or flat units).
    pub fn node_count(&self) -> usize {
        match self {
            Self::Hierarchical(units) => units.iter().map(|u| u.lessons.len()).sum(),
            Self::Flat(units) => units.len(),
        }
    }

    /// Parse a persisted curriculum document.
    ///
    /// Accepts `{"curriculum": {"units": [...]}}` or a bare `{"units": [...]}`.
    /// Units carrying a `lessons` array make the tree hierarchical; the shape
    /// must be uniform across all units.
    pub fn from_document_json(json: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| LessonCtxError::parse(format!("invalid curriculum JSON: {e}")))?;
        Self::from_document(doc)
    }

    pub fn from_document(mut doc: Value) -> Result<Self> {
        let root = if doc.get("curriculum").is_some() {
            doc["curriculum"].take()
        } else {
            doc
        };
        let units = match root {
            Value::Object(mut map) => map
                .remove("units")
                .ok_or_else(|| LessonCtxError::parse("curriculum document has no `units` array"))?,
            _ => return Err(LessonCtxError::parse("curriculum document must be a JSON object")),
        };
        let Value::Array(units) = units else {
            return Err(LessonCtxError::parse("`units` must be an array"));
        };

        let hierarchical = units.iter().filter(|u| u.get("lessons").is_some()).count();
        let tree = if hierarchical == units.len() && !units.is_empty() {
            let units: Vec<HierarchicalUnit> = serde_json::from_value(Value::Array(units))
                .map_err(|e| LessonCtxError::parse(format!("invalid hierarchical unit: {e}")))?;
            Self::Hierarchical(units)
        } else if hierarchical == 0 {
            let units: Vec<FlatUnit> = serde_json::from_value(Value::Array(units))
                .map_err(|e| LessonCtxError::parse(format!("invalid flat unit: {e}")))?;
            Self::Flat(units)
        } else {
            return Err(LessonCtxError::parse(format!(
                "curriculum mixes hierarchical and flat units ({hierarchical} of {} have lessons)",
                units.len()
            )));
        };

        tree.validate()?;
        Ok(tree)
    }

    /// Render back to the persisted document shape.
    pub fn to_document(&self) -> Value {
        let units = match self {
            Self::Hierarchical(units) => serde_json::to_value(units),
            Self::Flat(units) => serde_json::to_value(units),
        }
        .unwrap_or(Value::Array(Vec::new()));
        serde_json::json!({ "curriculum": { "units": units } })
    }

    /// Check that lesson identifiers are unique within the tree.
    pub fn validate(&self) -> Result<()> {
        let ids: Vec<u32> = match self {
            Self::Hierarchical(units) => units
                .iter()
                .flat_map(|u| u.lessons.iter().map(|l| l.lesson_number))
                .collect(),
            Self::Flat(units) => units.iter().map(|u| u.unit_number).collect(),
        };

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(LessonCtxError::validation(format!(
                    "duplicate {} identifier {id} in {} curriculum",
                    match self {
                        Self::Hierarchical(_) => "lesson",
                        Self::Flat(_) => "unit",
                    },
                    self.shape()
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Textbook
// ---------------------------------------------------------------------------

/// One scanned page of a textbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(alias = "book_text")]
    pub content: String,
    /// Sequential scan-order number.
    #[serde(alias = "page_no")]
    pub pdf_page_no: u32,
    /// Number printed on the page, absent for unnumbered pages.
    #[serde(default)]
    pub book_page_no: Option<u32>,
}

/// Extracted text of one textbook, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Textbook {
    #[serde(default)]
    pub title: String,
    pub pages: Vec<PageContent>,
}

impl Textbook {
    pub fn new(title: impl Into<String>, pages: Vec<PageContent>) -> Self {
        Self {
            title: title.into(),
            pages,
        }
    }

    /// Parse extracted pages: either a bare array or `{"pages": [...]}`.
    pub fn from_pages_json(title: impl Into<String>, json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Doc {
            Bare(Vec<PageContent>),
            Wrapped { pages: Vec<PageContent> },
        }

        let doc: Doc = serde_json::from_str(json)
            .map_err(|e| LessonCtxError::parse(format!("invalid textbook JSON: {e}")))?;
        let pages = match doc {
            Doc::Bare(pages) | Doc::Wrapped { pages } => pages,
        };
        Ok(Self::new(title, pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchical_document_parses() {
        let json = r#"{
            "curriculum": {"units": [{
                "unit_number": 1,
                "unit_title": "Weather",
                "lessons": [{
                    "lesson_number": 1,
                    "lesson_title": "Rainy days",
                    "lesson_plan_types": [{
                        "type": "vocabulary_word_meaning",
                        "student_learning_outcomes": ["Use weather words"],
                        "book_references": [{"book_type": "LB", "pages": [110, 111]}],
                        "external_resources": [{"title": "Song", "type": "audio", "reference": "70"}]
                    }]
                }]
            }]}
        }"#;

        let tree = CurriculumTree::from_document_json(json).expect("parse");
        assert_eq!(tree.shape(), TreeShape::Hierarchical);
        assert_eq!(tree.node_count(), 1);

        let CurriculumTree::Hierarchical(units) = &tree else {
            panic!("expected hierarchical tree");
        };
        let entry = &units[0].lessons[0].lesson_plan_types[0];
        assert_eq!(entry.type_tag, "vocabulary_word_meaning");
        assert_eq!(entry.book_references[0].book_type, BookType::Learners);
        assert!(entry.skills.is_empty());
        assert_eq!(entry.external_resources[0].resource_type, "audio");
    }

    #[test]
    fn flat_document_parses_without_wrapper() {
        let json = r#"{"units": [
            {"unit_number": 13, "unit_title": "Position and Movement", "content": "Clockwise"},
            {"unit_number": 14, "lesson_plan_types": [{"type": "concept"}]}
        ]}"#;

        let tree = CurriculumTree::from_document_json(json).expect("parse");
        assert_eq!(tree.shape(), TreeShape::Flat);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn mixed_shapes_are_rejected() {
        let json = r#"{"units": [
            {"unit_number": 1, "lessons": []},
            {"unit_number": 2, "lesson_plan_types": []}
        ]}"#;
        let err = CurriculumTree::from_document_json(json).unwrap_err();
        assert!(err.to_string().contains("mixes"));
    }

    #[test]
    fn duplicate_lesson_numbers_are_rejected() {
        let json = r#"{"units": [
            {"unit_number": 1, "lessons": [{"lesson_number": 4}]},
            {"unit_number": 2, "lessons": [{"lesson_number": 4}]}
        ]}"#;
        let err = CurriculumTree::from_document_json(json).unwrap_err();
        assert!(matches!(err, LessonCtxError::Validation { .. }));
        assert!(err.to_string().contains("duplicate lesson identifier 4"));
    }

    #[test]
    fn unknown_book_type_fails_parse() {
        let json = r#"{"units": [{"unit_number": 1, "lessons": [{"lesson_number": 1,
            "lesson_plan_types": [{"type": "grammar",
                "book_references": [{"book_type": "ZZ", "pages": [1]}]}]}]}]}"#;
        assert!(CurriculumTree::from_document_json(json).is_err());
    }

    #[test]
    fn document_round_trips() {
        let json = r#"{"units": [{"unit_number": 3, "lesson_plan_types": [{"type": "practice"}]}]}"#;
        let tree = CurriculumTree::from_document_json(json).unwrap();
        let again = CurriculumTree::from_document(tree.to_document()).unwrap();
        assert_eq!(tree, again);
    }

    #[test]
    fn textbook_accepts_extraction_aliases() {
        let json = r#"[
            {"book_text": "Cover", "page_no": 1},
            {"content": "Rain", "pdf_page_no": 2, "book_page_no": 110}
        ]"#;
        let book = Textbook::from_pages_json("Learner's Book", json).unwrap();
        assert_eq!(book.pages.len(), 2);
        assert_eq!(book.pages[0].content, "Cover");
        assert_eq!(book.pages[0].book_page_no, None);
        assert_eq!(book.pages[1].book_page_no, Some(110));

        let wrapped = r#"{"pages": [{"content": "x", "pdf_page_no": 5}]}"#;
        assert_eq!(Textbook::from_pages_json("", wrapped).unwrap().pages.len(), 1);
    }

    #[test]
    fn curriculum_fixture_validates() {
        let fixture =
            std::fs::read_to_string("../../../fixtures/json/curriculum_english_grade2.json")
                .expect("read fixture");
        let tree = CurriculumTree::from_document_json(&fixture).expect("parse fixture");
        assert_eq!(tree.shape(), TreeShape::Hierarchical);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn maths_fixture_validates() {
        let fixture =
            std::fs::read_to_string("../../../fixtures/json/curriculum_maths_grade2.json")
                .expect("read fixture");
        let tree = CurriculumTree::from_document_json(&fixture).expect("parse fixture");
        assert_eq!(tree.shape(), TreeShape::Flat);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn textbook_fixture_validates() {
        let fixture = std::fs::read_to_string(
            "../../../fixtures/json/textbook_english_grade2_learners.json",
        )
        .expect("read fixture");
        let book = Textbook::from_pages_json("Learner's Book", &fixture).expect("parse fixture");
        assert_eq!(book.pages.len(), 4);
        assert!(book.pages.iter().any(|p| p.book_page_no == Some(110)));
    }
}
