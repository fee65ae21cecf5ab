use crate::repository::{
    entities::{AppInstance, AppInstanceDraft, Result},
    lifecycle::Hook,
};

pub const NO_ABSTRACT: &str = "No abstract provided";
pub const NO_TITLE: &str = "No title provided";

/// Fills in a blank title and abstract before an instance is written, so no stored instance
/// ever has either blank.
#[derive(Debug, Default)]
pub struct DefaultMetadata;

impl Hook<AppInstance> for DefaultMetadata {
    fn name(&self) -> &'static str {
        "default_metadata"
    }

    fn pre_save(&self, draft: &mut AppInstanceDraft) -> Result<()> {
        if is_blank(&draft.abstract_) {
            draft.abstract_ = Some(NO_ABSTRACT.into());
        }

        if is_blank(&draft.title) {
            draft.title = Some(NO_TITLE.into());
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}
