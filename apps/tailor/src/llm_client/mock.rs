use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Content, GenerationClient, GenerationConfig, GenerationError};

/// A recorded call to the scripted client.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub config: GenerationConfig,
    pub contents: Vec<Content>,
}

/// Replays canned responses in order and records every call it receives.
#[derive(Default)]
pub struct ScriptedGenerationClient {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerationClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(
        &self,
        model: &str,
        config: &GenerationConfig,
        contents: &[Content],
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            config: config.clone(),
            contents: contents.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
