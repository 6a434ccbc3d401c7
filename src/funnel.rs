use std::collections::{BTreeMap, HashSet};

use tracing::info;

use crate::classifier::MAX_INTERVIEW_QUESTIONS;
use crate::insights;
use crate::models::{
    sub_stage_label, CandidateFunnelResult, FunnelStageMetrics, FunnelSummary, StageKind,
};

#[derive(Default)]
struct StageAccumulator<'a> {
    entered: HashSet<&'a str>,
    completed: HashSet<&'a str>,
    dropped: HashSet<&'a str>,
    dwell_ms: Vec<i64>,
    questions: BTreeMap<u8, StageAccumulator<'a>>,
}

impl<'a> StageAccumulator<'a> {
    fn question(&mut self, number: u8) -> &mut StageAccumulator<'a> {
        self.questions.entry(number).or_default()
    }

    fn finish(self, stage_name: String, stage_id: String) -> FunnelStageMetrics {
        let candidates_entered = self.entered.len();
        let candidates_completed = self.completed.len();

        let sub_stages = self
            .questions
            .into_iter()
            .filter(|(number, _)| (1..=MAX_INTERVIEW_QUESTIONS).contains(number))
            .map(|(number, acc)| acc.finish(format!("Question {number}"), sub_stage_label(number)))
            .collect();

        FunnelStageMetrics {
            stage_name,
            stage_id,
            candidates_entered,
            candidates_completed,
            candidates_dropped: self.dropped.len(),
            conversion_rate: rate(candidates_completed, candidates_entered),
            avg_time_in_stage_ms: mean(&self.dwell_ms),
            sub_stages,
        }
    }
}

/// Builds per-stage funnel metrics, in canonical stage order.
///
/// Synthetic events take no part in the counts or dwell times; they only
/// feed `decision_made`, which [`summarize`] reports separately.
pub fn aggregate(results: &[CandidateFunnelResult]) -> Vec<FunnelStageMetrics> {
    let mut buckets: [StageAccumulator; 4] = Default::default();

    for result in results {
        let candidate = result.candidate_id.as_str();
        let mut previous: Option<(StageKind, Option<u8>, chrono::NaiveDateTime)> = None;

        for event in result.stages.iter().filter(|e| !e.synthetic) {
            let bucket = &mut buckets[event.kind.index()];
            bucket.entered.insert(candidate);
            if event.completed {
                bucket.completed.insert(candidate);
            }
            if let Some(number) = event.question {
                let sub = bucket.question(number);
                sub.entered.insert(candidate);
                if event.completed {
                    sub.completed.insert(candidate);
                }
            }

            if let Some((kind, question, at)) = previous {
                let dwell = (event.timestamp - at).num_milliseconds();
                if dwell > 0 {
                    let prior = &mut buckets[kind.index()];
                    prior.dwell_ms.push(dwell);
                    if let Some(number) = question {
                        prior.question(number).dwell_ms.push(dwell);
                    }
                }
            }
            previous = Some((event.kind, event.question, event.timestamp));
        }

        if let Some(stage) = result.dropped_at {
            let bucket = &mut buckets[stage.index()];
            bucket.dropped.insert(candidate);
            if stage == StageKind::Interview {
                let last_question = result
                    .stages
                    .iter()
                    .rev()
                    .filter(|e| !e.synthetic)
                    .find_map(|e| e.question);
                if let Some(number) = last_question {
                    bucket.question(number).dropped.insert(candidate);
                }
            }
        }
    }

    StageKind::ALL
        .iter()
        .zip(buckets)
        .map(|(kind, acc)| acc.finish(kind.display_name().to_string(), kind.stage_id().to_string()))
        .collect()
}

/// Rolls classified candidates up into the batch-level funnel summary.
pub fn summarize(results: Vec<CandidateFunnelResult>, total_messages: usize) -> FunnelSummary {
    let stages = aggregate(&results);
    let total_candidates = results.len();
    let decisions = results.iter().filter(|r| r.decision_made).count();

    let decision_times: Vec<i64> = results
        .iter()
        .filter_map(|r| match (r.started_at, r.decision_timestamp) {
            (Some(start), Some(decided)) => Some((decided - start).num_milliseconds()),
            _ => None,
        })
        .filter(|ms| *ms > 0)
        .collect();

    let completed = stages
        .iter()
        .find(|s| s.stage_id == StageKind::Completed.stage_id())
        .map(|s| s.candidates_completed)
        .unwrap_or(0);

    info!(
        candidates = total_candidates,
        decisions,
        completed,
        "funnel summarised"
    );

    let status_distribution = insights::status_distribution(&results);
    let mut summary = FunnelSummary {
        total_candidates,
        total_messages,
        stages,
        decisions,
        overall_conversion_rate: rate(decisions, total_candidates),
        avg_time_to_decision_ms: mean(&decision_times),
        total_drop_off: total_candidates.saturating_sub(completed),
        status_distribution,
        approval_rate: rate(status_distribution.approved, total_candidates),
        response_rate: rate(
            status_distribution.approved + status_distribution.rejected,
            total_candidates,
        ),
        daily_conversations: insights::summarize_daily(&results),
        insights: Vec::new(),
        candidates: results,
    };
    summary.insights = insights::generate_insights(&summary);
    summary
}

/// Candidates lost between a stage and the one before it.
pub fn stage_drop_off(stages: &[FunnelStageMetrics], index: usize) -> (usize, f64) {
    if index == 0 || index >= stages.len() {
        return (0, 0.0);
    }
    let before = stages[index - 1].candidates_entered;
    let lost = before.saturating_sub(stages[index].candidates_entered);
    (lost, rate(lost, before))
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}
