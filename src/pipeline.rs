//! Diff-to-message pipeline
//!
//! parse → filter → rank → select → serialize → cache → split → queue →
//! combine → cache. Every collaborator with state or I/O is passed in through
//! [`Services`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::ai::prompts::{commit_user_prompt, COMMIT_SYSTEM_PROMPT};
use crate::ai::{Message, ModelClient, ModelRequest, RequestQueue};
use crate::combine::{CommitPolicy, LongestMessageCombiner, ResultCombiner};
use crate::config::Config;
use crate::core::CacheManager;
use crate::diff::{DiffParser, FileDiff, StatusEntry};
use crate::error::{PipelineError, RequestError};
use crate::filter::{NoiseFilter, RelevancyScorer};
use crate::select::{AiSelector, FileSelector, SelectionOutcome, SelectionStrategy};
use crate::tokens::{
    counter_for_model, ContentSerializer, LineCaps, TokenBudget, TokenBudgetSplitter, TokenCounter,
};

/// Injected collaborators
pub struct Services {
    pub counter: Arc<dyn TokenCounter>,
    pub cache: Arc<CacheManager>,
    pub queue: Option<Arc<RequestQueue>>,
    pub combiner: Arc<dyn ResultCombiner>,
    pub ai_selector: Option<Arc<dyn SelectionStrategy>>,
}

impl Services {
    /// Wiring for real generation over `client`
    pub fn connected(config: &Config, client: Arc<dyn ModelClient>) -> Self {
        let queue = Arc::new(RequestQueue::new(client, config.queue.clone()));
        let counter = counter_for_model(&config.ai.model);
        let ai_selector = config.selection.ai_selection.then(|| {
            let budget = AiSelector::budget_for(&config.ai, &config.splitter, counter.as_ref());
            let selector =
                AiSelector::new(queue.clone(), config.ai.clone(), counter.clone(), budget);
            Arc::new(selector) as Arc<dyn SelectionStrategy>
        });

        Self {
            counter,
            cache: Arc::new(CacheManager::new(&config.cache)),
            queue: Some(queue),
            combiner: Arc::new(LongestMessageCombiner::new(CommitPolicy::from(&config.commit))),
            ai_selector,
        }
    }

    /// Wiring that never reaches a model
    pub fn offline(config: &Config) -> Self {
        Self {
            counter: counter_for_model(&config.ai.model),
            cache: Arc::new(CacheManager::new(&config.cache)),
            queue: None,
            combiner: Arc::new(LongestMessageCombiner::new(CommitPolicy::from(&config.commit))),
            ai_selector: None,
        }
    }
}

/// Filtered, selected and serialized changes, ready to split
#[derive(Debug, Clone)]
pub struct Prepared {
    pub parsed_files: usize,
    pub filtered_files: usize,
    pub ranked_files: usize,
    pub selection: SelectionOutcome,
    pub content: String,
    pub cache_key: String,
    pub budget: TokenBudget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMessage {
    pub message: String,
    pub cached: bool,
    pub chunks: usize,
    pub failed_chunks: usize,
}

pub struct Pipeline {
    config: Config,
    parser: DiffParser,
    filter: NoiseFilter,
    scorer: RelevancyScorer,
    selector: FileSelector,
    serializer: ContentSerializer,
    splitter: TokenBudgetSplitter,
    budget: TokenBudget,
    cache: Arc<CacheManager>,
    queue: Option<Arc<RequestQueue>>,
    combiner: Arc<dyn ResultCombiner>,
}

impl Pipeline {
    pub fn new(config: Config, services: Services) -> Self {
        let system_tokens = services.counter.count(COMMIT_SYSTEM_PROMPT);
        let budget = TokenBudget::for_model(
            &config.ai.model,
            &config.splitter,
            system_tokens,
            config.ai.max_tokens as usize,
        );
        debug!(
            window = budget.window,
            reserved = budget.reserved,
            budget = budget.budget,
            counter = services.counter.name(),
            "Token budget"
        );

        Self {
            parser: DiffParser::new(config.splitter.max_chunk_size),
            filter: NoiseFilter::new(config.filter.clone()),
            scorer: RelevancyScorer::new(config.filter.relevancy_threshold),
            selector: FileSelector::new(config.selection.clone(), services.ai_selector),
            serializer: ContentSerializer::new(LineCaps::from_config(&config.splitter)),
            splitter: TokenBudgetSplitter::new(services.counter, budget.budget),
            budget,
            cache: services.cache,
            queue: services.queue,
            combiner: services.combiner,
            config,
        }
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Token count of `text` under the pipeline's counter
    pub fn count_tokens(&self, text: &str) -> usize {
        self.splitter.count(text)
    }

    /// Everything up to, but not including, the cache lookup
    pub async fn prepare(
        &self,
        diff_text: &str,
        statuses: &[StatusEntry],
    ) -> Result<Prepared, PipelineError> {
        let diff = self.parser.parse_with_statuses(diff_text, statuses);
        let parsed_files = diff.files.len();

        let diff = self.filter.filter(diff);
        let filtered_files = diff.files.len();

        let ranked = self.scorer.rank(diff.files);
        let ranked_files = ranked.len();
        debug!(parsed_files, filtered_files, ranked_files, "Ranked files");
        if ranked.is_empty() {
            return Err(PipelineError::NoRelevantChanges {
                parsed_files,
                filtered_files,
            });
        }

        let selection = self.selector.select(ranked).await;
        let files: Vec<FileDiff> = selection.files.iter().map(|s| s.file.clone()).collect();
        let content = self.serializer.serialize(&files);

        // The policy shapes both the prompt and the combined answer
        let keyed = match CommitPolicy::from(&self.config.commit).fingerprint() {
            Some(policy) => format!("{}\n\0{}", content, policy),
            None => content.clone(),
        };
        let cache_key = CacheManager::key(
            &keyed,
            &self.config.ai.model,
            &self.config.ai.provider,
            self.config.ai.temperature,
        );

        Ok(Prepared {
            parsed_files,
            filtered_files,
            ranked_files,
            selection,
            content,
            cache_key,
            budget: self.budget,
        })
    }

    /// Request-sized pieces of the prepared content
    pub fn split(&self, prepared: &Prepared) -> Result<Vec<String>, PipelineError> {
        self.splitter.split(&prepared.content)
    }

    /// Full run: the cached message, or a freshly generated one
    pub async fn generate(
        &self,
        diff_text: &str,
        statuses: &[StatusEntry],
    ) -> Result<GeneratedMessage, PipelineError> {
        let prepared = self.prepare(diff_text, statuses).await?;

        if let Some(message) = self.cache.get(&prepared.cache_key) {
            info!("Using cached commit message");
            return Ok(GeneratedMessage {
                message,
                cached: true,
                chunks: 0,
                failed_chunks: 0,
            });
        }

        let queue = self.queue.as_ref().ok_or(PipelineError::Offline)?;
        let chunks = self.split(&prepared)?;
        let total = chunks.len();
        info!(chunks = total, budget = self.budget.budget, "Requesting commit message");

        let requests = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                ModelRequest::from_config(
                    &self.config.ai,
                    vec![
                        Message::system(COMMIT_SYSTEM_PROMPT),
                        Message::user(commit_user_prompt(chunk, i + 1, total, &self.config.commit)),
                    ],
                )
            })
            .collect();

        let mut messages = Vec::new();
        let mut last_error = None;
        for result in queue.submit_all(requests).await {
            match result {
                Ok(response) => messages.push(response.content),
                Err(err) => {
                    debug!(error = %err, "Chunk request failed");
                    last_error = Some(err);
                }
            }
        }
        let failed_chunks = total - messages.len();

        if queue.is_shut_down() {
            return Err(PipelineError::Request {
                attempts: 0,
                source: RequestError::Cancelled,
            });
        }

        let message = match self.combiner.combine(messages) {
            Some(message) => message,
            None => {
                let last = last_error
                    .as_ref()
                    .and_then(PipelineError::request_error)
                    .cloned()
                    .unwrap_or_else(|| RequestError::Malformed("empty model output".to_string()));
                return Err(PipelineError::AllChunksFailed { count: total, last });
            }
        };

        self.cache.set(
            &prepared.cache_key,
            &message,
            &self.config.ai.model,
            &self.config.ai.provider,
        );

        Ok(GeneratedMessage {
            message,
            cached: false,
            chunks: total,
            failed_chunks,
        })
    }

    /// Stop dispatching and cancel outstanding requests
    pub fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.shutdown();
        }
    }
}
