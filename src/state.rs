//! Application state: session registry, language packs, and the shared engine.
//!
//! This module owns:
//!   - the session registry (one lockable session per session id)
//!   - the language catalog (per-language reference data, loaded on first use)
//!   - the engine (oracle client, difficulty sampler, prompts, tuning)
//!   - process settings (defaults for setup)

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, AgentConfig, ServerConfig};
use crate::difficulty::{DifficultySampler, NormalSampler, SeededSampler};
use crate::error::EngineError;
use crate::openai::OpenAI;
use crate::oracle::ChatOracle;
use crate::registry::SessionRegistry;
use crate::session::Engine;
use crate::vocab::LanguageCatalog;

pub struct AppState {
    pub sessions: SessionRegistry,
    pub catalog: LanguageCatalog,
    pub engine: Engine,
    pub server: ServerConfig,
}

impl AppState {
    pub fn new(
        server: ServerConfig,
        agent: AgentConfig,
        oracle: Arc<dyn ChatOracle>,
        sampler: Arc<dyn DifficultySampler>,
    ) -> Self {
        let engine = Engine::new(
            oracle,
            sampler,
            agent.prompts,
            agent.engine,
            server.native_language.clone(),
        );
        Self {
            sessions: SessionRegistry::default(),
            catalog: LanguageCatalog::new(server.data_dir.clone()),
            engine,
            server,
        }
    }

    /// Build state from env: load config, init OpenAI. Fails without an API key.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, EngineError> {
        let server = ServerConfig::from_env();
        let agent = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env(agent.prompts.clone())?;
        info!(target: "converso_backend", base_url = %openai.base_url, fast_model = %openai.fast_model, strong_model = %openai.strong_model, "OpenAI enabled.");
        info!(
            target: "converso_backend",
            data_dir = %server.data_dir.display(),
            default_language = %server.default_language,
            default_rating = server.default_rating,
            k_factor = agent.engine.k_factor,
            "Engine configured"
        );

        let sampler: Arc<dyn DifficultySampler> = match server.difficulty_seed {
            Some(seed) => {
                info!(target: "converso_backend", seed, "Deterministic difficulty sampling");
                Arc::new(SeededSampler::new(seed))
            }
            None => Arc::new(NormalSampler),
        };

        Ok(Self::new(server, agent, Arc::new(openai), sampler))
    }
}
