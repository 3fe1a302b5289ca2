use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_ingest();
        self.apply_env_overrides_gateway();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid RAGLINE_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RAGLINE_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("RAGLINE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = Some(v);
        }
        if let Ok(v) = std::env::var("RAGLINE_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("RAGLINE_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("RAGLINE_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = Some(n);
        }
    }

    fn apply_env_overrides_ingest(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("RAGLINE_INDEX_COLLECTION") {
            self.index.collection = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_SPLITTER_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.splitter.chunk_size = n;
        }
        if let Ok(v) = std::env::var("RAGLINE_SPLITTER_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.splitter.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("RAGLINE_RETRIEVAL_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("RAGLINE_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    fn apply_env_overrides_gateway(&mut self) {
        if let Ok(v) = std::env::var("RAGLINE_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("RAGLINE_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("RAGLINE_GATEWAY_ALLOWED_ORIGINS") {
            self.gateway.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("RAGLINE_GATEWAY_RATE_LIMIT")
            && let Ok(limit) = v.parse::<u32>()
        {
            self.gateway.rate_limit = limit;
        }
        if let Ok(v) = std::env::var("RAGLINE_GATEWAY_MAX_BODY_SIZE")
            && let Ok(bytes) = v.parse::<usize>()
        {
            self.gateway.max_body_size = bytes;
        }
    }
}
