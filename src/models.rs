use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    AiAgent,
    Candidate,
}

impl Role {
    /// Maps the `Entity` column of a transcript export onto a role.
    pub fn from_entity(entity: &str) -> Option<Self> {
        match entity.trim().to_ascii_lowercase().as_str() {
            "ai" | "ai_recruiter" | "ai_agent" | "recruiter" | "assistant" => Some(Role::AiAgent),
            "user" | "candidate" => Some(Role::Candidate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub position: usize,
    pub role: Role,
    pub text: String,
    pub timestamp: NaiveDateTime,
    pub candidate_id: String,
}

/// All messages exchanged with one candidate, sorted ascending by timestamp.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub candidate_id: String,
    pub candidate_name: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.messages.first().map(|m| m.timestamp)
    }

    pub fn ended_at(&self) -> Option<NaiveDateTime> {
        self.messages.last().map(|m| m.timestamp)
    }
}

/// The four canonical recruiting-pipeline stages, in funnel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Engagement,
    Interview,
    Scheduling,
    Completed,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Engagement,
        StageKind::Interview,
        StageKind::Scheduling,
        StageKind::Completed,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            StageKind::Engagement => "AI Engagement",
            StageKind::Interview => "Interview Questions",
            StageKind::Scheduling => "HR Interview Scheduling",
            StageKind::Completed => "Completed",
        }
    }

    pub fn stage_id(self) -> &'static str {
        match self {
            StageKind::Engagement => "ai_engagement",
            StageKind::Interview => "interview_questions",
            StageKind::Scheduling => "hr_interview_scheduling",
            StageKind::Completed => "completed",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StageKind,
    /// Interview question number; only set on interview events.
    pub question: Option<u8>,
    /// `2.n` label of the question, alongside `question`.
    pub sub_stage: Option<String>,
    pub timestamp: NaiveDateTime,
    pub message: String,
    pub completed: bool,
    /// Inferred by the end-of-conversation fallback rather than observed mid-conversation.
    pub synthetic: bool,
}

pub fn sub_stage_label(question: u8) -> String {
    format!("2.{question}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFunnelResult {
    pub candidate_id: String,
    pub candidate_name: String,
    pub stages: Vec<StageEvent>,
    pub current_stage: Option<String>,
    pub decision_made: bool,
    pub decision_timestamp: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub total_duration_ms: i64,
    pub message_count: usize,
    pub status: CandidateStatus,
    pub dropped_at: Option<StageKind>,
}

/// Outcome bucket for a candidate, from the decision or the message volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Pass,
    Fail,
    NoResp,
}

impl CandidateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateStatus::Pass => "PASS",
            CandidateStatus::Fail => "FAIL",
            CandidateStatus::NoResp => "NO_RESP",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistribution {
    pub approved: usize,
    pub rejected: usize,
    pub no_response: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trend,
    Anomaly,
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStageMetrics {
    pub stage_name: String,
    pub stage_id: String,
    pub candidates_entered: usize,
    pub candidates_completed: usize,
    pub candidates_dropped: usize,
    pub conversion_rate: f64,
    pub avg_time_in_stage_ms: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_stages: Vec<FunnelStageMetrics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSummary {
    pub total_candidates: usize,
    pub total_messages: usize,
    pub stages: Vec<FunnelStageMetrics>,
    pub decisions: usize,
    pub overall_conversion_rate: f64,
    pub avg_time_to_decision_ms: f64,
    pub total_drop_off: usize,
    pub status_distribution: StatusDistribution,
    pub approval_rate: f64,
    pub response_rate: f64,
    pub daily_conversations: Vec<DailyConversationCount>,
    pub insights: Vec<Insight>,
    pub candidates: Vec<CandidateFunnelResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyConversationCount {
    pub date: NaiveDate,
    pub count: usize,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CommentKind {
    Comment,
    Annotation,
    Decision,
}

impl CommentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentKind::Comment => "comment",
            CommentKind::Annotation => "annotation",
            CommentKind::Decision => "decision",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "comment" => Some(CommentKind::Comment),
            "annotation" => Some(CommentKind::Annotation),
            "decision" => Some(CommentKind::Decision),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewerComment {
    pub id: Uuid,
    pub candidate_id: String,
    pub author: String,
    pub content: String,
    pub kind: CommentKind,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentStats {
    pub total: usize,
    pub open: usize,
    pub resolved: usize,
    pub comments: usize,
    pub annotations: usize,
    pub decisions: usize,
}
