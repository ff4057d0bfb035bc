//! Fallback skill: used when no pattern matched and the LLM path is
//! disabled or skipped. The reply comes from the fallback response set; the
//! handler only has to exist so dispatch does not report a missing handler.

use async_trait::async_trait;

use super::{SkillHandler, SkillOutput, SkillRequest};
use crate::error::Result;

pub struct FallbackSkill;

#[async_trait]
impl SkillHandler for FallbackSkill {
    async fn handle(&self, request: SkillRequest<'_>) -> Result<SkillOutput> {
        log::debug!("Unrecognised query: \"{}\"", request.text);
        Ok(SkillOutput::default())
    }
}
