//! Shared collaborators of the tournament engine.

use crate::config::RoyaleConfig;
use crate::coordination::{CoordinationStore, MemoryCoordination};
use crate::db::{MemoryRoyaleStore, RoyaleStore};
use crate::evaluator::Evaluator;
use crate::events::EventHub;
use crate::questions::{QuestionBank, StaticQuestionBank};
use std::sync::Arc;

/// Handles to the durable store, coordination store, evaluator, question
/// bank and event hub. Cheap to clone.
#[derive(Clone)]
pub struct RoyaleContext {
    pub store: Arc<dyn RoyaleStore>,
    pub coordination: Arc<dyn CoordinationStore>,
    pub evaluator: Arc<dyn Evaluator>,
    pub questions: Arc<dyn QuestionBank>,
    pub events: EventHub,
    pub config: RoyaleConfig,
}

impl RoyaleContext {
    pub fn new(
        store: Arc<dyn RoyaleStore>,
        coordination: Arc<dyn CoordinationStore>,
        evaluator: Arc<dyn Evaluator>,
        questions: Arc<dyn QuestionBank>,
        config: RoyaleConfig,
    ) -> Self {
        Self {
            store,
            coordination,
            evaluator,
            questions,
            events: EventHub::default(),
            config,
        }
    }

    /// Context backed entirely by in-process stores and the built-in questions
    pub fn in_memory(evaluator: Arc<dyn Evaluator>, config: RoyaleConfig) -> Self {
        Self::new(
            Arc::new(MemoryRoyaleStore::new()),
            Arc::new(MemoryCoordination::new()),
            evaluator,
            Arc::new(StaticQuestionBank::builtin()),
            config,
        )
    }
}
