use std::fmt::Write;

use crate::funnel;
use crate::models::{CommentKind, CommentStats, FunnelSummary, ReviewerComment, StageKind};

pub fn summarize_comments(comments: &[ReviewerComment]) -> CommentStats {
    let mut stats = CommentStats::default();

    for comment in comments {
        stats.total += 1;
        if comment.resolved {
            stats.resolved += 1;
        } else {
            stats.open += 1;
        }
        match comment.kind {
            CommentKind::Comment => stats.comments += 1,
            CommentKind::Annotation => stats.annotations += 1,
            CommentKind::Decision => stats.decisions += 1,
        }
    }

    stats
}

/// Renders milliseconds as `2d 3h`, `1h 5m`, `4m 10s` or `12s`.
pub fn format_duration(ms: f64) -> String {
    let seconds = (ms.max(0.0) / 1000.0).floor() as i64;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

pub fn build_report(
    source: &str,
    summary: &FunnelSummary,
    filtered_out: &[String],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Conversation Funnel Report");
    let _ = writeln!(
        output,
        "Generated from {} ({} candidates, {} messages)",
        source, summary.total_candidates, summary.total_messages
    );
    if !filtered_out.is_empty() {
        let _ = writeln!(
            output,
            "Excluded {} test candidate(s): {}",
            filtered_out.len(),
            filtered_out.join(", ")
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Decisions reached: {} of {} ({:.1}%)",
        summary.decisions, summary.total_candidates, summary.overall_conversion_rate
    );
    let _ = writeln!(
        output,
        "- Avg time to decision: {}",
        format_duration(summary.avg_time_to_decision_ms)
    );
    let _ = writeln!(output, "- Total drop-off: {}", summary.total_drop_off);

    let status = &summary.status_distribution;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Candidate Status");
    let _ = writeln!(
        output,
        "- PASS {}, FAIL {}, NO_RESP {}",
        status.approved, status.rejected, status.no_response
    );
    let _ = writeln!(
        output,
        "- Approval rate {:.1}%, response rate {:.1}%",
        summary.approval_rate, summary.response_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Funnel Stages");

    if summary.total_candidates == 0 {
        let _ = writeln!(output, "No conversations in this upload.");
    } else {
        for (index, stage) in summary.stages.iter().enumerate() {
            let _ = writeln!(
                output,
                "- {}: {} entered, {} completed ({:.1}%), {} dropped, avg {}",
                stage.stage_name,
                stage.candidates_entered,
                stage.candidates_completed,
                stage.conversion_rate,
                stage.candidates_dropped,
                format_duration(stage.avg_time_in_stage_ms)
            );
            let (lost, lost_rate) = funnel::stage_drop_off(&summary.stages, index);
            if lost > 0 {
                let _ = writeln!(
                    output,
                    "  - lost {} ({:.1}%) since previous stage",
                    lost, lost_rate
                );
            }
            for question in stage.sub_stages.iter() {
                let _ = writeln!(
                    output,
                    "  - {} [{}]: {} entered, {} completed ({:.1}%), {} dropped, avg {}",
                    question.stage_name,
                    question.stage_id,
                    question.candidates_entered,
                    question.candidates_completed,
                    question.conversion_rate,
                    question.candidates_dropped,
                    format_duration(question.avg_time_in_stage_ms)
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Conversations");

    if summary.daily_conversations.is_empty() {
        let _ = writeln!(output, "No conversations recorded.");
    } else {
        for day in summary.daily_conversations.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): {} conversations",
                day.date,
                day.date.format("%A"),
                day.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");

    if summary.insights.is_empty() {
        let _ = writeln!(output, "No insights for this upload.");
    } else {
        for insight in summary.insights.iter() {
            let _ = writeln!(
                output,
                "- [{:?}] {}: {}",
                insight.priority, insight.title, insight.description
            );
        }
    }

    let mut stalled: Vec<_> = summary
        .candidates
        .iter()
        .filter(|c| c.dropped_at.is_some())
        .collect();
    stalled.sort_by(|a, b| b.total_duration_ms.cmp(&a.total_duration_ms));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stalled Candidates");

    if stalled.is_empty() {
        let _ = writeln!(output, "No candidates stalled.");
    } else {
        for candidate in stalled.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) stopped at {} after {}",
                candidate.candidate_name,
                candidate.candidate_id,
                candidate
                    .dropped_at
                    .map(StageKind::display_name)
                    .unwrap_or("an unknown stage"),
                format_duration(candidate.total_duration_ms as f64)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Interviews Scheduled");

    let decided: Vec<_> = summary.candidates.iter().filter(|c| c.decision_made).collect();
    if decided.is_empty() {
        let _ = writeln!(output, "No candidates reached the completed stage.");
    } else {
        for candidate in decided.iter() {
            let when = candidate
                .decision_timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} ({}) confirmed {}",
                candidate.candidate_name, candidate.candidate_id, when
            );
        }
    }

    output
}
