//! Curriculum locator: find the lesson-plan-type entry for a request.
//!
//! Works over both tree shapes. Hierarchical trees are addressed by lesson
//! number, flat trees by unit number. Within the addressed node the first
//! entry whose tag matches the requested type (exactly or through the alias
//! table) wins, in document order.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use lessonctx_shared::{
    CurriculumKey, CurriculumStore, CurriculumTree, Grade, LessonCtxError, LessonPlanTypeEntry,
    Result, Subject,
};

use crate::lesson_types::{TypeMatch, match_type};

/// The entry a request resolved to, plus where it sits in the tree.
#[derive(Debug, Clone, Serialize)]
pub struct LocatedNode {
    pub subject: Subject,
    pub grade: Grade,
    pub lesson: u32,
    pub requested_type: String,
    pub unit_number: u32,
    pub unit_title: String,
    /// Lesson title for hierarchical trees, unit title for flat ones.
    pub node_title: String,
    pub type_match: TypeMatch,
    pub entry: LessonPlanTypeEntry,
}

impl LocatedNode {
    /// The stored tag the request matched.
    pub fn matched_type(&self) -> &str {
        &self.entry.type_tag
    }
}

/// Why a request resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotFoundReason {
    NoCurriculum,
    LessonNotPresent,
    TypeNotPresent {
        /// Tags the addressed node does carry.
        available: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NotFound {
    pub subject: Subject,
    pub grade: Grade,
    pub lesson: u32,
    pub requested_type: String,
    #[serde(flatten)]
    pub reason: NotFoundReason,
}

impl NotFound {
    /// Convert into the fatal error for callers that require a match.
    pub fn into_error(self) -> LessonCtxError {
        let subject = self.subject.to_string();
        let grade = self.grade.to_string();
        match self.reason {
            NotFoundReason::NoCurriculum => LessonCtxError::NotFoundCurriculum { subject, grade },
            NotFoundReason::LessonNotPresent => LessonCtxError::LessonNotPresent {
                subject,
                grade,
                lesson: self.lesson,
            },
            NotFoundReason::TypeNotPresent { .. } => LessonCtxError::TypeNotPresent {
                lesson: self.lesson,
                lesson_type: self.requested_type,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Location {
    Found(LocatedNode),
    NotFound(NotFound),
}

/// Look up the curriculum for `(subject, grade)` and locate the entry.
///
/// `grade` may be in either store form; it is normalized here. A grade with
/// no recoverable number is a fatal [`LessonCtxError::Normalization`], while
/// a missing curriculum, lesson, or type is reported as [`Location::NotFound`].
#[instrument(skip(store, subject), fields(subject = %subject))]
pub async fn locate<S: CurriculumStore>(
    store: &S,
    subject: Subject,
    grade: &str,
    lesson: u32,
    requested_type: &str,
) -> Result<Location> {
    let grade = Grade::parse(grade)?;
    let key = CurriculumKey::new(subject, grade);

    let not_found = |reason| {
        Location::NotFound(NotFound {
            subject,
            grade,
            lesson,
            requested_type: requested_type.to_string(),
            reason,
        })
    };

    let Some(tree) = store.curriculum(&key).await? else {
        debug!(%key, "no curriculum stored");
        return Ok(not_found(NotFoundReason::NoCurriculum));
    };

    if tree.shape() != subject.expected_shape() {
        warn!(
            %key,
            shape = %tree.shape(),
            expected = %subject.expected_shape(),
            "curriculum shape differs from subject default"
        );
    }

    match locate_in_tree(&tree, lesson, requested_type) {
        Ok(found) => Ok(Location::Found(LocatedNode {
            subject,
            grade,
            lesson,
            requested_type: requested_type.to_string(),
            unit_number: found.unit_number,
            unit_title: found.unit_title.to_string(),
            node_title: found.node_title.to_string(),
            type_match: found.type_match,
            entry: found.entry.clone(),
        })),
        Err(reason) => Ok(not_found(reason)),
    }
}

/// A borrowed match inside a tree.
#[derive(Debug)]
pub struct TreeMatch<'a> {
    pub unit_number: u32,
    pub unit_title: &'a str,
    pub node_title: &'a str,
    pub type_match: TypeMatch,
    pub entry: &'a LessonPlanTypeEntry,
}

/// Locate within an already loaded tree.
pub fn locate_in_tree<'a>(
    tree: &'a CurriculumTree,
    lesson: u32,
    requested_type: &str,
) -> std::result::Result<TreeMatch<'a>, NotFoundReason> {
    let (unit_number, unit_title, node_title, entries) = match tree {
        CurriculumTree::Hierarchical(units) => units
            .iter()
            .find_map(|unit| {
                unit.lessons
                    .iter()
                    .find(|l| l.lesson_number == lesson)
                    .map(|l| {
                        (
                            unit.unit_number,
                            unit.unit_title.as_str(),
                            l.lesson_title.as_str(),
                            l.lesson_plan_types.as_slice(),
                        )
                    })
            })
            .ok_or(NotFoundReason::LessonNotPresent)?,
        CurriculumTree::Flat(units) => units
            .iter()
            .find(|u| u.unit_number == lesson)
            .map(|u| {
                (
                    u.unit_number,
                    u.unit_title.as_str(),
                    u.unit_title.as_str(),
                    u.lesson_plan_types.as_slice(),
                )
            })
            .ok_or(NotFoundReason::LessonNotPresent)?,
    };

    entries
        .iter()
        .find_map(|entry| {
            match_type(requested_type, &entry.type_tag).map(|type_match| TreeMatch {
                unit_number,
                unit_title,
                node_title,
                type_match,
                entry,
            })
        })
        .ok_or_else(|| NotFoundReason::TypeNotPresent {
            available: entries.iter().map(|e| e.type_tag.clone()).collect(),
        })
}
