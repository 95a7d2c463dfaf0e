//! Warehouse Recon Common Library
//!
//! 照合エンジンとCLIで共有される型とユーティリティ

pub mod columns;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod types;

pub use columns::{ColumnKeywords, ColumnRole, RoleKeywords};
pub use error::{Error, Result};
pub use parser::{extract_json_object, parse_marking_response};
pub use prompts::build_marking_prompt;
pub use types::{
    Classification, ComparisonRecord, IssueKind, MarkingRecord, PhotoRecord, QualityAssessment,
    QualityStatus, RecognizedMarking, SpecificationItem, StatusTier, COMMENT_MARKING_UNREADABLE,
    COMMENT_PHOTO_UNREADABLE,
};
