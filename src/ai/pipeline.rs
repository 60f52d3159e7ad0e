//! Decision pipeline
//!
//! Four stages run in a fixed order over one context:
//! Analyze -> Evaluate -> ConsultModel -> Validate.
//! Only ConsultModel does I/O. Every failure on the model path ends in the
//! heuristic, and Validate replaces anything illegal, so a run always ends
//! with a decision.

use derive_more::Display;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

use crate::ai::analysis;
use crate::ai::context::{DecisionContext, DecisionPath};
use crate::ai::decision::{Action, Decision};
use crate::ai::difficulty::{DifficultyLevel, DifficultyProfile};
use crate::ai::heuristic::HeuristicDecisionMaker;
use crate::ai::interpreter::ResponseInterpreter;
use crate::ai::prompt::PromptBuilder;
use crate::battle::moves::{MoveLookup, MoveTable};
use crate::battle::snapshot::{BattleSnapshot, Player, TurnRecord};
use crate::core::config::AiConfig;
use crate::core::error::{BattleAiError, Result};
use crate::llm::client::{ChatClient, ChatCompletion, ChatRequest, LlmClient, LlmError};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Analyze,
    Evaluate,
    ConsultModel,
    Validate,
}

type StageFn = for<'c> fn(&mut DecisionPipeline, &mut DecisionContext<'c>);

const STAGES: [(Stage, StageFn); 4] = [
    (Stage::Analyze, DecisionPipeline::analyze),
    (Stage::Evaluate, DecisionPipeline::evaluate),
    (Stage::ConsultModel, DecisionPipeline::consult_model),
    (Stage::Validate, DecisionPipeline::validate),
];

/// Reusable across sequential requests; each request needs its own context
pub struct DecisionPipeline {
    level: DifficultyLevel,
    lookup: Arc<dyn MoveLookup>,
    client: Option<Arc<dyn ChatClient>>,
    interpreter: ResponseInterpreter,
    heuristic: HeuristicDecisionMaker,
    model: String,
    max_tokens: u32,
    rng: ChaCha8Rng,
}

impl DecisionPipeline {
    /// Pipeline with injected collaborators. Without a chat client every
    /// request goes down the heuristic path.
    pub fn new(lookup: Arc<dyn MoveLookup>, client: Option<Arc<dyn ChatClient>>) -> Self {
        let defaults = AiConfig::default();
        Self {
            level: DifficultyLevel::default(),
            interpreter: ResponseInterpreter::new(lookup.clone()),
            heuristic: HeuristicDecisionMaker::new(lookup.clone()),
            lookup,
            client,
            model: defaults.llm.model,
            max_tokens: defaults.llm.max_tokens,
            rng: ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }

    /// Pipeline for a difficulty name with an empty move table and no model
    ///
    /// Difficulty only changes in-stage behavior, never the stage order.
    pub fn for_difficulty(level: &str) -> Self {
        Self::new(Arc::new(MoveTable::new()), None)
            .with_level(DifficultyLevel::from_name(Some(level)))
    }

    /// Pipeline wired from configuration
    ///
    /// A client that can't be built (say, no API key) is logged and left
    /// out; decisions then come from the heuristic.
    pub fn from_config(config: &AiConfig, lookup: Arc<dyn MoveLookup>) -> Self {
        let client: Option<Arc<dyn ChatClient>> = match LlmClient::from_config(&config.llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "LLM client unavailable, decisions will use heuristics");
                None
            }
        };
        let pipeline = Self::new(lookup, client)
            .with_level(DifficultyLevel::from_name(Some(&config.pipeline.difficulty)))
            .with_model(config.llm.model.clone())
            .with_max_tokens(config.llm.max_tokens);
        match config.pipeline.seed {
            Some(seed) => pipeline.with_seed(seed),
            None => pipeline,
        }
    }

    pub fn with_level(mut self, level: DifficultyLevel) -> Self {
        self.level = level;
        self
    }

    /// Seed the random source for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn level(&self) -> DifficultyLevel {
        self.level
    }

    pub fn has_model(&self) -> bool {
        self.client.is_some()
    }

    /// Move-selection context using this pipeline's difficulty
    pub fn new_context<'a>(
        &self,
        battle: &'a BattleSnapshot,
        ai_player: &'a Player,
        opponent: &'a Player,
        history: Vec<TurnRecord>,
    ) -> DecisionContext<'a> {
        DecisionContext::new(
            battle,
            ai_player,
            opponent,
            history,
            DifficultyProfile::for_difficulty(self.level),
        )
    }

    /// Run every stage and return the decision left in the context
    ///
    /// Blocks while the model is consulted. Fails only if no stage left a
    /// decision behind, which means the fallback contract was broken.
    pub fn run(&mut self, context: &mut DecisionContext) -> Result<Decision> {
        let span = tracing::info_span!(
            "decision",
            request = %context.request_id(),
            difficulty = %context.difficulty().level(),
            kind = %context.request(),
        );
        let _enter = span.enter();

        for (stage, run_stage) in STAGES {
            tracing::debug!(%stage, "Running stage");
            run_stage(self, context);
        }

        let decision = context
            .decision()
            .or(context.annotations.last_decision.as_ref())
            .cloned()
            .ok_or_else(|| BattleAiError::NoDecision(context.request_id().to_string()))?;

        tracing::info!(
            decision = %decision.summary(),
            confidence = decision.confidence(),
            path = %context.annotations.path.map(|p| p.to_string()).unwrap_or_default(),
            "Decision made"
        );
        Ok(decision)
    }

    /// Derived facts, gated by the difficulty's capability flags
    fn analyze(&mut self, context: &mut DecisionContext<'_>) {
        let profile = context.difficulty().clone();
        let Some(ai) = context.ai_active() else {
            tracing::debug!("No active combatant, nothing to analyze");
            return;
        };
        let opponent = context.opponent_active();

        if profile.considers_type_effectiveness() {
            if let Some(opp) = opponent {
                context.annotations.matchup = Some(analysis::type_matchup(ai, opp));
            }
        }
        if profile.considers_type_effectiveness() || profile.analyzes_power() {
            context.annotations.move_assessments =
                analysis::assess_moves(ai, opponent, self.lookup.as_ref());
        }
        if profile.plans_strategically() {
            if let Some(opp) = opponent {
                let bench_available = context.ai_player().switch_candidates().next().is_some();
                context.annotations.strategy = Some(analysis::strategic_outlook(
                    ai,
                    opp,
                    context.annotations.matchup.as_ref(),
                    bench_available,
                ));
            }
        }
    }

    /// Rank candidates using what Analyze found
    fn evaluate(&mut self, context: &mut DecisionContext<'_>) {
        let profile = context.difficulty().clone();
        context.annotations.ranked_moves =
            analysis::rank_moves(&context.annotations.move_assessments, profile.analyzes_power());

        let wants_switches = context.is_switch_request()
            || context
                .annotations
                .strategy
                .as_ref()
                .map_or(false, |s| s.consider_switch);
        if wants_switches {
            context.annotations.switch_ranking = analysis::rank_switches(
                context.ai_player(),
                context.opponent_active(),
                profile.considers_type_effectiveness(),
            );
        }
    }

    /// Ask the model unless the difficulty says to skip it; any failure
    /// falls straight through to the heuristic, without retrying
    fn consult_model(&mut self, context: &mut DecisionContext<'_>) {
        let is_switch = context.is_switch_request();

        if context.difficulty().should_use_fallback(&mut self.rng) {
            tracing::debug!("Difficulty roll skipped the model this turn");
            context.set_use_fallback(true);
            let decision = self.heuristic.make_decision(context, is_switch, &mut self.rng);
            record(context, DecisionPath::DifficultyFallback, decision);
            return;
        }

        match self.ask_model(context) {
            Ok(completion) => match self.interpreter.interpret(&completion.text, context) {
                Some(decision) => record(context, DecisionPath::Model, decision),
                None => {
                    tracing::warn!(
                        response = %completion.text,
                        "Model response was unparsable, using heuristic"
                    );
                    context.set_use_fallback(true);
                    let decision = self.heuristic.make_decision(context, is_switch, &mut self.rng);
                    record(context, DecisionPath::ModelUnparsable, decision);
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Model call failed, using heuristic");
                context.set_error(e.to_string());
                context.set_use_fallback(true);
                let decision = self.heuristic.make_decision(context, is_switch, &mut self.rng);
                record(context, DecisionPath::ModelError, decision);
            }
        }
    }

    fn ask_model(&self, context: &DecisionContext<'_>) -> std::result::Result<ChatCompletion, LlmError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| LlmError::Auth("no chat client configured".into()))?;

        let prompt =
            PromptBuilder::build_for_profile(context.difficulty(), context.request(), &context.summary());
        let request = ChatRequest {
            model: self.model.clone(),
            messages: prompt.into_messages(),
            max_tokens: self.max_tokens,
        };

        let completion = client.complete(&request)?;
        tracing::info!(
            model = %completion.model,
            tokens = completion.tokens_used,
            "Model responded"
        );
        Ok(completion)
    }

    /// Replace a missing or illegal decision with a fresh heuristic one
    fn validate(&mut self, context: &mut DecisionContext<'_>) {
        let legal = context
            .decision()
            .map_or(false, |decision| is_legal(decision, context));
        if legal {
            return;
        }

        tracing::warn!(
            decision = ?context.decision().map(Decision::summary),
            "Decision failed validation, replacing with heuristic"
        );
        let decision =
            self.heuristic
                .make_decision(context, context.is_switch_request(), &mut self.rng);
        context.set_use_fallback(true);
        context.annotations.path = Some(DecisionPath::ValidationReplaced);
        context.set_decision(decision);
    }
}

fn record(context: &mut DecisionContext<'_>, path: DecisionPath, decision: Decision) {
    tracing::debug!(%path, decision = %decision.summary(), "Decision recorded");
    context.annotations.path = Some(path);
    context.annotations.last_decision = Some(decision.clone());
    context.set_decision(decision);
}

/// Whether a decision can still be carried out in this context
pub fn is_legal(decision: &Decision, context: &DecisionContext<'_>) -> bool {
    let player = context.ai_player();
    match decision.action() {
        Action::Move {
            move_index,
            selected_move,
        } => {
            if context.is_switch_request() {
                return false;
            }
            let moves = context.available_moves();
            match move_index {
                Some(i) => moves
                    .get(*i)
                    .map_or(false, |name| {
                        name.trim().to_lowercase() == selected_move.name.trim().to_lowercase()
                    }),
                None => moves.is_empty() && selected_move.is_placeholder(),
            }
        }
        Action::Switch {
            switch_target: Some(target),
        } => player.team.get(target.team_index).map_or(false, |member| {
            member.name == target.name
                && !member.is_fainted()
                && !player.is_active(target.team_index)
        }),
        Action::Switch {
            switch_target: None,
        } => context.is_switch_request() && player.switch_candidates().next().is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::decision::DecisionKind;
    use crate::ai::heuristic::{EASY_CONFIDENCE, FLOOR_CONFIDENCE};
    use crate::ai::interpreter::MODEL_CONFIDENCE;
    use crate::battle::moves::MoveRecord;
    use crate::battle::snapshot::Combatant;
    use crate::core::types::PokemonType;
    use std::sync::Mutex;

    /// Returns canned text and remembers the prompts it saw
    struct ScriptedClient {
        reply: std::result::Result<String, &'static str>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection reset"),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatClient for ScriptedClient {
        fn complete(&self, request: &ChatRequest) -> std::result::Result<ChatCompletion, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(ChatCompletion {
                    text: text.clone(),
                    model: request.model.clone(),
                    tokens_used: 12,
                }),
                Err(e) => Err(LlmError::RequestFailed(e.to_string())),
            }
        }
    }

    fn players() -> (BattleSnapshot, Player, Player) {
        let ai = Player::new(
            "Gary",
            vec![
                Combatant::new("Charizard", vec![PokemonType::Fire, PokemonType::Flying], 150)
                    .with_moves(["ember", "flame-thrower", "fire-blast", "tackle"]),
                Combatant::new("Blastoise", vec![PokemonType::Water], 160),
            ],
        );
        let opponent = Player::new(
            "Red",
            vec![Combatant::new("Venusaur", vec![PokemonType::Grass], 155)],
        );
        (BattleSnapshot::new(4), ai, opponent)
    }

    fn pipeline(client: Option<Arc<dyn ChatClient>>) -> DecisionPipeline {
        DecisionPipeline::new(Arc::new(MoveTable::new()), client).with_seed(7)
    }

    #[test]
    fn test_stage_order() {
        let order: Vec<Stage> = STAGES.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![Stage::Analyze, Stage::Evaluate, Stage::ConsultModel, Stage::Validate]
        );
    }

    #[test]
    fn test_model_decision_accepted() {
        let (battle, ai, opp) = players();
        let client = ScriptedClient::replying("MOVE: 2\nREASONING: strong matchup");
        let mut pipeline = pipeline(Some(client.clone()));
        let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.selected_move().unwrap().name, "flame-thrower");
        assert_eq!(decision.confidence(), MODEL_CONFIDENCE);
        assert_eq!(decision.reasoning(), "strong matchup");
        assert_eq!(ctx.annotations.path, Some(DecisionPath::Model));
        assert!(!ctx.use_fallback());

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].messages[1].content.contains("Charizard"));
    }

    #[test]
    fn test_model_error_recorded_and_heuristic_used() {
        let (battle, ai, opp) = players();
        let mut pipeline = pipeline(Some(ScriptedClient::failing()));
        let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.kind(), DecisionKind::Move);
        assert_ne!(decision.confidence(), MODEL_CONFIDENCE);
        assert!(ctx.error().unwrap().contains("connection reset"));
        assert_eq!(ctx.annotations.path, Some(DecisionPath::ModelError));
        assert!(ctx.use_fallback());
    }

    #[test]
    fn test_unparsable_response_uses_heuristic_without_error() {
        let (battle, ai, opp) = players();
        let mut pipeline = pipeline(Some(ScriptedClient::replying("I like turtles")));
        let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.kind(), DecisionKind::Move);
        assert!(ctx.error().is_none());
        assert_eq!(ctx.annotations.path, Some(DecisionPath::ModelUnparsable));
    }

    #[test]
    fn test_no_client_counts_as_model_error() {
        let (battle, ai, opp) = players();
        let mut pipeline = DecisionPipeline::for_difficulty("hard").with_seed(3);
        let mut ctx = pipeline.new_context(&battle, &ai, &opp, vec![]);

        let decision = pipeline.run(&mut ctx).unwrap();
        assert!(ctx.error().is_some());
        assert!(decision.confidence() <= 0.8);
    }

    #[tokio::test]
    async fn test_http_client_inside_async_runtime_falls_back() {
        let (battle, ai, opp) = players();
        let client = LlmClient::new(
            "test-key".into(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            std::time::Duration::from_secs(2),
        )
        .unwrap();
        let mut pipeline = pipeline(Some(Arc::new(client)));
        let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.kind(), DecisionKind::Move);
        assert_eq!(ctx.annotations.path, Some(DecisionPath::ModelError));
        assert!(ctx.error().unwrap().contains("single-threaded async runtime"));
    }

    #[test]
    fn test_model_switch_to_fainted_member_is_replaced() {
        let battle = BattleSnapshot::new(4);
        let ai = Player::new(
            "Gary",
            vec![
                Combatant::new("Charizard", vec![PokemonType::Fire], 150).with_moves(["ember"]),
                Combatant::new("Blastoise", vec![PokemonType::Water], 160).with_hp(0),
            ],
        );
        let opp = Player::new("Red", vec![Combatant::new("Onix", vec![PokemonType::Rock], 90)]);
        let mut pipeline = pipeline(Some(ScriptedClient::replying("SWITCH: Blastoise")));
        let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.kind(), DecisionKind::Move);
        assert_eq!(decision.selected_move().unwrap().name, "ember");
        assert_eq!(ctx.annotations.path, Some(DecisionPath::ValidationReplaced));
    }

    #[test]
    fn test_switch_request_rejects_model_move() {
        let (battle, ai, opp) = players();
        let mut pipeline = pipeline(Some(ScriptedClient::replying("MOVE: 1")));
        let mut ctx =
            DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard()).for_switch();

        let decision = pipeline.run(&mut ctx).unwrap();
        assert_eq!(decision.kind(), DecisionKind::Switch);
        assert_eq!(decision.switch_target().unwrap().name, "Blastoise");
    }

    #[test]
    fn test_easy_difficulty_fallback_skips_model() {
        let (battle, ai, opp) = players();
        let client = ScriptedClient::replying("MOVE: 1");
        let mut pipeline = pipeline(Some(client.clone()));

        let mut skipped = 0;
        for _ in 0..200 {
            let mut ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::easy());
            let decision = pipeline.run(&mut ctx).unwrap();
            if ctx.annotations.path == Some(DecisionPath::DifficultyFallback) {
                skipped += 1;
                assert_eq!(decision.confidence(), EASY_CONFIDENCE);
            }
        }
        assert!(skipped > 20 && skipped < 100, "skipped {} of 200", skipped);
        assert_eq!(client.seen.lock().unwrap().len(), 200 - skipped);
    }

    #[test]
    fn test_analyze_respects_capability_flags() {
        let (battle, ai, opp) = players();
        let mut pipeline = pipeline(None);

        let mut easy = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::easy());
        pipeline.analyze(&mut easy);
        assert!(easy.annotations.matchup.is_some());
        assert!(easy.annotations.strategy.is_none());

        let mut hard = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::hard());
        pipeline.analyze(&mut hard);
        pipeline.evaluate(&mut hard);
        assert!(hard.annotations.strategy.is_some());
        assert_eq!(hard.annotations.move_assessments.len(), 4);
        assert_eq!(hard.annotations.ranked_moves.len(), 4);
    }

    #[test]
    fn test_is_legal() {
        let (battle, ai, opp) = players();
        let ctx = DecisionContext::new(&battle, &ai, &opp, vec![], DifficultyProfile::medium());

        let good = Decision::use_move(Some(3), MoveRecord::named("Tackle", 40), "x", 0.5);
        let wrong_slot = Decision::use_move(Some(0), MoveRecord::named("tackle", 40), "x", 0.5);
        let placeholder = Decision::use_move(None, MoveRecord::placeholder(), "x", 0.1);
        let to_active = Decision::switch_to(0, "Charizard", "x", 0.5);
        let to_bench = Decision::switch_to(1, "Blastoise", "x", 0.5);
        let nowhere = Decision::cannot_switch("x", 0.1);

        assert!(is_legal(&good, &ctx));
        assert!(!is_legal(&wrong_slot, &ctx));
        assert!(!is_legal(&placeholder, &ctx));
        assert!(!is_legal(&to_active, &ctx));
        assert!(is_legal(&to_bench, &ctx));
        assert!(!is_legal(&nowhere, &ctx));
        assert_eq!(FLOOR_CONFIDENCE, 0.1);
    }
}
