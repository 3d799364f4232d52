
pub(crate) use super::test_helpers::*;
pub(crate) use super::{PipelineController, WHOLE_REGION};
pub(crate) use crate::config::{Config, StorageConfig};
pub(crate) use serde_json::json;
pub(crate) use std::sync::Arc;
pub(crate) use std::time::Duration;
