//! Greeting skill: enough context for the time-of-day template selection.

use async_trait::async_trait;
use chrono::{Local, Timelike};
use serde_json::json;

use super::{time::time_period, SkillHandler, SkillOutput, SkillRequest};
use crate::error::Result;

pub struct GreetingSkill;

#[async_trait]
impl SkillHandler for GreetingSkill {
    async fn handle(&self, _request: SkillRequest<'_>) -> Result<SkillOutput> {
        let now = Local::now();

        let mut output = SkillOutput::default();
        output.data = json!({
            "hour": now.hour(),
            "time_of_day": time_period(now.hour()),
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        Ok(output)
    }
}
