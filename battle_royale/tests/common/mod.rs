//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use battle_royale::config::RoyaleConfig;
use battle_royale::context::RoyaleContext;
use battle_royale::evaluator::{
    ComplexityClass, ComplexityEstimate, Evaluator, GradeReport, GradingError, Language,
};
use battle_royale::identity::{Identity, Role};
use battle_royale::matches::{Match, MatchManager};
use battle_royale::questions::TestCase;
use battle_royale::royale::models::{CreateRoyaleRequest, Royale};
use battle_royale::royale::RoyaleManager;
use std::sync::Arc;
use std::time::Duration;

/// Evaluator driven by the submitted code itself.
///
/// The code is `<verdict>[;<complexity label>]` where verdict is `pass`,
/// `fail`, `partial:<n>`, `crash` or `slow`.
pub struct ScriptedEvaluator;

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn grade(
        &self,
        code: &str,
        _language: Language,
        test_cases: &[TestCase],
    ) -> Result<GradeReport, GradingError> {
        let total = test_cases.len() as u32;
        let verdict = code.split(';').next().unwrap_or_default().trim();

        let passed_count = match verdict {
            "pass" => total,
            "fail" => 0,
            "crash" => return Err(GradingError::Crashed("scripted crash".into())),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                total
            }
            other => other
                .strip_prefix("partial:")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0)
                .min(total),
        };

        Ok(GradeReport {
            passed: total > 0 && passed_count == total,
            output: format!("{passed_count}/{total}"),
            passed_count,
            total_count: total,
        })
    }

    async fn estimate_complexity(
        &self,
        code: &str,
        _language: Language,
    ) -> Result<ComplexityEstimate, GradingError> {
        let class = code
            .split(';')
            .nth(1)
            .map(ComplexityClass::from_label)
            .unwrap_or(ComplexityClass::Linear);
        Ok(ComplexityEstimate {
            class,
            explanation: "scripted".into(),
        })
    }
}

pub fn test_config() -> RoyaleConfig {
    RoyaleConfig {
        countdown_secs: 1,
        grading_timeout: Duration::from_millis(500),
        ..RoyaleConfig::default()
    }
}

pub fn managers_with(config: RoyaleConfig) -> (RoyaleManager, MatchManager) {
    let ctx = RoyaleContext::in_memory(Arc::new(ScriptedEvaluator), config);
    let royales = RoyaleManager::new(ctx);
    let matches = MatchManager::new(royales.clone());
    (royales, matches)
}

pub fn managers() -> (RoyaleManager, MatchManager) {
    managers_with(test_config())
}

pub fn admin() -> Identity {
    Identity::new("admin-1", "admin", Role::Admin)
}

pub fn teacher(n: usize) -> Identity {
    Identity::new(format!("teacher-{n}"), format!("teacher{n}"), Role::Teacher)
}

pub fn student(n: usize) -> Identity {
    Identity::new(format!("student-{n}"), format!("student{n}"), Role::Student)
}

pub async fn create(royales: &RoyaleManager, creator: &Identity) -> Royale {
    royales
        .create_royale(
            creator,
            CreateRoyaleRequest {
                title: "Integration Royale".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("create royale")
}

/// Create a royale as admin and join `n` students
pub async fn royale_with_students(royales: &RoyaleManager, n: usize) -> (Royale, Vec<Identity>) {
    let royale = create(royales, &admin()).await;
    let students: Vec<Identity> = (0..n).map(student).collect();
    for s in &students {
        royales.join_royale(&royale.code, s).await.expect("join");
    }
    (royale, students)
}

pub async fn round_matches(royales: &RoyaleManager, royale: &Royale, round: u32) -> Vec<Match> {
    royales
        .royale_details(royale.id)
        .await
        .expect("details")
        .matches
        .into_iter()
        .filter(|m| m.round == round)
        .collect()
}

pub fn identity_of(students: &[Identity], user_id: &str) -> Identity {
    students
        .iter()
        .find(|s| s.user_id == user_id)
        .cloned()
        .expect("known student")
}
