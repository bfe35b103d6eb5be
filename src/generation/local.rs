//! Embedded quantized-model completion client backed by llama-cpp-2.
//!
//! Weights load lazily on the first call and stay resident for the process
//! lifetime. The underlying context is not safe for concurrent use, so every
//! inference runs under one mutex: concurrent jobs queue here.

use super::{CompletionClient, CompletionError, CompletionRequest};
use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::token::data_array::LlamaTokenDataArray;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const CONTEXT_SIZE: u32 = 4096;

/// In-process completion client over locally stored quantized weights.
pub struct LocalCompletionClient {
    model_path: PathBuf,
    runtime: Mutex<Option<LocalRuntime>>,
}

struct LocalRuntime {
    backend: LlamaBackend,
    model: LlamaModel,
    ctx_params: LlamaContextParams,
}

// SAFETY: LocalRuntime lives behind the client's Mutex, so model and backend
// are never touched from two threads at once. The llama-cpp-2 model and
// backend types are documented as safe for read access; mutable state exists
// only in per-call contexts created inside `generate`.
unsafe impl Send for LocalRuntime {}

impl LocalRuntime {
    fn load(model_path: &Path) -> Result<Self, CompletionError> {
        tracing::info!(path = %model_path.display(), "Loading local model weights");
        let backend = LlamaBackend::init().map_err(|error| {
            CompletionError::ProviderUnavailable(format!("failed to init llama backend: {error}"))
        })?;
        let model_params = LlamaModelParams::default();
        let model =
            LlamaModel::load_from_file(&backend, model_path, &model_params).map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to load model from {}: {error}",
                    model_path.display()
                ))
            })?;
        let ctx_params =
            LlamaContextParams::default().with_n_ctx(std::num::NonZeroU32::new(CONTEXT_SIZE));
        tracing::info!("Local model loaded");
        Ok(Self {
            backend,
            model,
            ctx_params,
        })
    }

    fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, CompletionError> {
        let mut ctx = self
            .model
            .new_context(&self.backend, self.ctx_params.clone())
            .map_err(|error| {
                CompletionError::ProviderError(format!("failed to create context: {error}"))
            })?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|error| {
                CompletionError::ProviderError(format!("failed to tokenize prompt: {error}"))
            })?;

        let n_tokens = tokens.len();
        let mut batch = LlamaBatch::new(CONTEXT_SIZE as usize, 1);
        for (index, token) in tokens.iter().enumerate() {
            let is_last = index == n_tokens - 1;
            batch.add(*token, index as i32, &[0], is_last).map_err(|error| {
                CompletionError::ProviderError(format!("failed to add token: {error}"))
            })?;
        }

        ctx.decode(&mut batch).map_err(|error| {
            CompletionError::ProviderError(format!("failed to decode prompt: {error}"))
        })?;

        let mut output = String::new();
        let mut position = n_tokens;

        for _ in 0..max_tokens {
            let candidates = ctx.candidates_ith(batch.n_tokens() - 1);
            let mut candidates_array = LlamaTokenDataArray::from_iter(candidates, false);
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|duration| duration.as_nanos() as u32)
                .unwrap_or(42);
            let new_token = candidates_array.sample_token(seed);

            if self.model.is_eog_token(new_token) {
                break;
            }

            let token_str = self
                .model
                .token_to_str(new_token, Special::Tokenize)
                .map_err(|error| {
                    CompletionError::ProviderError(format!("failed to decode token: {error}"))
                })?;
            output.push_str(&token_str);

            batch.clear();
            batch.add(new_token, position as i32, &[0], true).map_err(|error| {
                CompletionError::ProviderError(format!("failed to add token: {error}"))
            })?;
            ctx.decode(&mut batch).map_err(|error| {
                CompletionError::ProviderError(format!("failed to decode: {error}"))
            })?;
            position += 1;
        }

        Ok(output)
    }
}

impl LocalCompletionClient {
    /// Construct a client for the given weights path. Loading is deferred to
    /// the first completion call.
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            runtime: Mutex::new(None),
        }
    }

    fn frame_chat_prompt(request: &CompletionRequest) -> String {
        format!(
            "<|im_start|>system\n{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
            request.system, request.user
        )
    }
}

#[async_trait]
impl CompletionClient for LocalCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let mut guard = self.runtime.lock().await;
        if guard.is_none() {
            *guard = Some(LocalRuntime::load(&self.model_path)?);
        }
        let runtime = guard.as_ref().expect("runtime loaded above");

        let prompt = Self::frame_chat_prompt(&request);
        runtime.generate(&prompt, request.max_tokens as usize)
    }
}
