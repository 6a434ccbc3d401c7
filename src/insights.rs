use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{
    CandidateFunnelResult, CandidateStatus, DailyConversationCount, FunnelSummary, Insight,
    InsightKind, Priority, StatusDistribution,
};

/// Below this many messages a candidate never really answered.
const NO_RESPONSE_BELOW_MESSAGES: usize = 3;
/// At or above this many messages an undecided candidate still counts as a pass.
const PASS_FROM_MESSAGES: usize = 6;

const LOW_APPROVAL_RATE: f64 = 30.0;
const LOW_RESPONSE_RATE: f64 = 70.0;
const SHORT_CONVERSATION_MS: f64 = 5.0 * 60.0 * 1000.0;
const PEAK_DAY_RATIO: usize = 3;

pub fn candidate_status(decision_made: bool, message_count: usize) -> CandidateStatus {
    if decision_made {
        CandidateStatus::Pass
    } else if message_count < NO_RESPONSE_BELOW_MESSAGES {
        CandidateStatus::NoResp
    } else if message_count >= PASS_FROM_MESSAGES {
        CandidateStatus::Pass
    } else {
        CandidateStatus::Fail
    }
}

pub fn status_distribution(results: &[CandidateFunnelResult]) -> StatusDistribution {
    let mut distribution = StatusDistribution::default();
    for result in results {
        match result.status {
            CandidateStatus::Pass => distribution.approved += 1,
            CandidateStatus::Fail => distribution.rejected += 1,
            CandidateStatus::NoResp => distribution.no_response += 1,
        }
    }
    distribution
}

/// Conversations per start date, oldest day first.
pub fn summarize_daily(results: &[CandidateFunnelResult]) -> Vec<DailyConversationCount> {
    let mut map: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

    for result in results {
        if let Some(started) = result.started_at {
            map.entry(started.date())
                .or_default()
                .push(result.candidate_name.clone());
        }
    }

    map.into_iter()
        .map(|(date, candidates)| DailyConversationCount {
            date,
            count: candidates.len(),
            candidates,
        })
        .collect()
}

/// Threshold rules over a finished summary. An empty batch yields nothing.
pub fn generate_insights(summary: &FunnelSummary) -> Vec<Insight> {
    let mut insights = Vec::new();
    if summary.total_candidates == 0 {
        return insights;
    }

    if summary.approval_rate < LOW_APPROVAL_RATE {
        insights.push(insight(
            "low-approval-rate",
            InsightKind::Anomaly,
            Priority::High,
            "Low Approval Rate Detected",
            format!(
                "Only {:.1}% of candidates are being approved.",
                summary.approval_rate
            ),
        ));
    }

    if summary.response_rate < LOW_RESPONSE_RATE {
        insights.push(insight(
            "low-response-rate",
            InsightKind::Anomaly,
            Priority::Medium,
            "High No-Response Rate",
            format!(
                "{:.1}% of candidates are not responding to interviews.",
                100.0 - summary.response_rate
            ),
        ));
    }

    let avg_duration_ms = summary
        .candidates
        .iter()
        .map(|c| c.total_duration_ms as f64)
        .sum::<f64>()
        / summary.total_candidates as f64;
    if avg_duration_ms < SHORT_CONVERSATION_MS {
        insights.push(insight(
            "short-conversations",
            InsightKind::Trend,
            Priority::Medium,
            "Short Interview Durations",
            "Average conversation duration is under 5 minutes.".to_string(),
        ));
    }

    let busiest = summary.daily_conversations.iter().map(|d| d.count).max();
    let quietest = summary.daily_conversations.iter().map(|d| d.count).min();
    if let (Some(busiest), Some(quietest)) = (busiest, quietest) {
        if busiest > quietest * PEAK_DAY_RATIO {
            insights.push(insight(
                "uneven-distribution",
                InsightKind::Trend,
                Priority::Low,
                "Uneven Interview Distribution",
                format!(
                    "The busiest day had {busiest} conversations against {quietest} on the quietest."
                ),
            ));
        }
    }

    if let Some(predicted) = weekly_forecast(summary) {
        insights.push(insight(
            "weekly-prediction",
            InsightKind::Prediction,
            Priority::Medium,
            "Weekly Hiring Forecast",
            format!(
                "Based on current trends, expect approximately {predicted} approved candidates per week."
            ),
        ));
    }

    insights
}

/// Approved candidates per week, projected from the daily volume and the
/// current approval ratio.
pub fn weekly_forecast(summary: &FunnelSummary) -> Option<u64> {
    let days = summary.daily_conversations.len();
    if days == 0 || summary.total_candidates == 0 {
        return None;
    }
    let conversations: usize = summary.daily_conversations.iter().map(|d| d.count).sum();
    let weekly_average = conversations as f64 / days.div_ceil(7) as f64;
    if weekly_average <= 0.0 {
        return None;
    }
    let approval = summary.status_distribution.approved as f64 / summary.total_candidates as f64;
    Some((weekly_average * approval).round() as u64)
}

fn insight(
    id: &str,
    kind: InsightKind,
    priority: Priority,
    title: &str,
    description: String,
) -> Insight {
    Insight {
        id: id.to_string(),
        kind,
        priority,
        title: title.to_string(),
        description,
    }
}
