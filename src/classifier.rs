//! Per-candidate stage classifier.
//!
//! Walks one conversation in order and tags recruiter messages with the
//! pipeline stage they open. Check order for a recruiter message is fixed:
//!
//! 1. first recruiter message is always engagement
//! 2. completion, only once the candidate answered a scheduling proposal
//! 3. scheduling, at most once per conversation
//! 4. interview question, capped at [`MAX_INTERVIEW_QUESTIONS`]
//!
//! Later pipeline stages win when a message matches several tables.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::models::{
    sub_stage_label, CandidateFunnelResult, Conversation, Message, Role, StageEvent, StageKind,
};
use crate::insights;
use crate::patterns::{mentions_next_step, COMPLETION_RULES, INTERVIEW_RULES, SCHEDULING_RULES};

pub const MAX_INTERVIEW_QUESTIONS: u8 = 10;

/// The end-of-conversation fallback only runs on transcripts longer than this.
const FALLBACK_MIN_MESSAGES: usize = 4;
const LATE_QUESTION_COUNT: u8 = 5;
const LATE_POSITION_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Opening,
    Engagement,
    Interview,
    Scheduling,
    SchedulingResponded,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Engage,
    Ask(u8),
    ProposeSchedule,
    ConfirmSchedule,
}

impl Transition {
    pub fn kind(self) -> StageKind {
        match self {
            Transition::Engage => StageKind::Engagement,
            Transition::Ask(_) => StageKind::Interview,
            Transition::ProposeSchedule => StageKind::Scheduling,
            Transition::ConfirmSchedule => StageKind::Completed,
        }
    }

    fn stage_name(self) -> String {
        self.kind().display_name().to_string()
    }

    fn into_event(self, index: usize, message: &Message) -> StageEvent {
        let (id, name, question) = match self {
            Transition::Ask(n) => (
                format!("interview_{n}"),
                format!("Interview Question {n}"),
                Some(n),
            ),
            Transition::Engage => (format!("engagement_{index}"), self.stage_name(), None),
            Transition::ProposeSchedule => (format!("scheduling_{index}"), self.stage_name(), None),
            Transition::ConfirmSchedule => (format!("completed_{index}"), self.stage_name(), None),
        };

        StageEvent {
            id,
            name,
            kind: self.kind(),
            sub_stage: question.map(sub_stage_label),
            question,
            timestamp: message.timestamp,
            message: message.text.clone(),
            completed: self == Transition::ConfirmSchedule,
            synthetic: false,
        }
    }
}

/// Mutable state threaded through the message walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierState {
    pub phase: Phase,
    pub questions_asked: u8,
    pub scheduling_proposed: bool,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self {
            phase: Phase::Opening,
            questions_asked: 0,
            scheduling_proposed: false,
        }
    }
}

impl ClassifierState {
    /// Feeds one recruiter message at list position `index` out of `total`.
    pub fn on_agent_message(&mut self, index: usize, total: usize, text: &str) -> Option<Transition> {
        if self.phase == Phase::Opening {
            self.phase = Phase::Engagement;
            return Some(Transition::Engage);
        }

        if self.phase == Phase::SchedulingResponded {
            if let Some(rule) = COMPLETION_RULES.first_match(text) {
                debug!(
                    index,
                    stage = COMPLETION_RULES.stage.display_name(),
                    rule = rule.as_str(),
                    "pattern matched"
                );
                self.phase = Phase::Completed;
                return Some(Transition::ConfirmSchedule);
            }
        }

        if !self.scheduling_proposed {
            let matched = SCHEDULING_RULES.first_match(text);
            let lenient = matched.is_none() && mentions_next_step(text) && self.is_late(index, total);
            if let Some(rule) = matched {
                debug!(
                    index,
                    stage = SCHEDULING_RULES.stage.display_name(),
                    rule = rule.as_str(),
                    "pattern matched"
                );
            }
            if matched.is_some() || lenient {
                if lenient {
                    debug!(index, "scheduling inferred from late next-step wording");
                }
                self.phase = Phase::Scheduling;
                self.scheduling_proposed = true;
                return Some(Transition::ProposeSchedule);
            }
        }

        let has_question = text.contains('?');
        let asks = match self.phase {
            Phase::Engagement => (has_question && index > 0) || INTERVIEW_RULES.matches(text),
            Phase::Interview => has_question,
            _ => false,
        };
        if !asks {
            return None;
        }

        if self.questions_asked >= MAX_INTERVIEW_QUESTIONS {
            debug!(index, "interview question cap reached, skipping");
            return None;
        }

        self.questions_asked += 1;
        self.phase = Phase::Interview;
        Some(Transition::Ask(self.questions_asked))
    }

    /// Feeds one candidate message. A reply to a scheduling proposal unlocks
    /// the completion check on the next recruiter turn.
    pub fn on_candidate_message(&mut self) {
        if self.phase == Phase::Scheduling {
            self.phase = Phase::SchedulingResponded;
        }
    }

    fn is_late(&self, index: usize, total: usize) -> bool {
        self.questions_asked >= LATE_QUESTION_COUNT || index as f64 > total as f64 * LATE_POSITION_RATIO
    }
}

pub fn classify(conversation: &Conversation) -> CandidateFunnelResult {
    let messages = &conversation.messages;
    let total = messages.len();
    let mut state = ClassifierState::default();
    let mut stages: Vec<StageEvent> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::AiAgent => {
                if let Some(transition) = state.on_agent_message(index, total, &message.text) {
                    let event = transition.into_event(index, message);
                    debug!(
                        candidate = %conversation.candidate_id,
                        index,
                        stage = event.kind.display_name(),
                        sub_stage = ?event.sub_stage,
                        "stage detected"
                    );
                    stages.push(event);
                }
            }
            Role::Candidate => {
                state.on_candidate_message();
                if let Some(last) = stages.last_mut() {
                    if last.kind != StageKind::Completed {
                        last.completed = true;
                    }
                }
            }
        }
    }

    if !state.scheduling_proposed && total > FALLBACK_MIN_MESSAGES {
        stages.extend(infer_closing_stages(messages));
    }

    let result = build_result(conversation, stages);
    debug!(
        candidate = %result.candidate_id,
        stages = result.stages.len(),
        decision = result.decision_made,
        "conversation classified"
    );
    result
}

/// Synthesises scheduling (and possibly completion) from the last turns of a
/// conversation that never hit an explicit scheduling trigger. Only applies
/// when the candidate has the final word.
fn infer_closing_stages(messages: &[Message]) -> Vec<StageEvent> {
    let Some(reply) = messages.last().filter(|m| m.role == Role::Candidate) else {
        return Vec::new();
    };
    let Some((agent_index, last_agent)) = messages
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| m.role == Role::AiAgent)
    else {
        return Vec::new();
    };

    if !SCHEDULING_RULES.matches(&last_agent.text) {
        return Vec::new();
    }

    debug!(index = agent_index, "implicit scheduling in final recruiter message");
    let mut events = vec![implicit_event(StageKind::Scheduling, last_agent)];

    if COMPLETION_RULES.matches(&reply.text) {
        debug!("implicit completion in final candidate reply");
        events.push(implicit_event(StageKind::Completed, reply));
    }

    events
}

fn implicit_event(kind: StageKind, message: &Message) -> StageEvent {
    let prefix = match kind {
        StageKind::Completed => "completed",
        _ => "scheduling",
    };
    StageEvent {
        id: format!("{prefix}_implicit"),
        name: kind.display_name().to_string(),
        kind,
        question: None,
        sub_stage: None,
        timestamp: message.timestamp,
        message: message.text.clone(),
        completed: true,
        synthetic: true,
    }
}

fn build_result(conversation: &Conversation, stages: Vec<StageEvent>) -> CandidateFunnelResult {
    let decision_timestamp: Option<NaiveDateTime> = stages
        .iter()
        .find(|s| s.kind == StageKind::Completed)
        .map(|s| s.timestamp);

    let dropped_at = if decision_timestamp.is_none() {
        stages
            .iter()
            .rev()
            .find(|s| !s.synthetic)
            .or(stages.last())
            .map(|s| s.kind)
    } else {
        None
    };

    let total_duration_ms = match (conversation.started_at(), conversation.ended_at()) {
        (Some(start), Some(end)) => (end - start).num_milliseconds(),
        _ => 0,
    };

    CandidateFunnelResult {
        candidate_id: conversation.candidate_id.clone(),
        candidate_name: conversation.candidate_name.clone(),
        current_stage: stages.last().map(|s| s.name.clone()),
        decision_made: decision_timestamp.is_some(),
        decision_timestamp,
        started_at: conversation.started_at(),
        total_duration_ms,
        message_count: conversation.messages.len(),
        status: insights::candidate_status(decision_timestamp.is_some(), conversation.messages.len()),
        dropped_at,
        stages,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    pub(crate) fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap()
    }

    /// Builds a conversation from `(role, text, minutes after start)` triples.
    pub(crate) fn conversation(id: &str, turns: &[(Role, &str, i64)]) -> Conversation {
        Conversation {
            candidate_id: id.to_string(),
            candidate_name: format!("Candidate {id}"),
            messages: turns
                .iter()
                .enumerate()
                .map(|(position, (role, text, minutes))| Message {
                    position,
                    role: *role,
                    text: text.to_string(),
                    timestamp: base_time() + Duration::minutes(*minutes),
                    candidate_id: id.to_string(),
                })
                .collect(),
        }
    }

    fn kinds(result: &CandidateFunnelResult) -> Vec<StageKind> {
        result.stages.iter().map(|s| s.kind).collect()
    }

    const AI: Role = Role::AiAgent;
    const ME: Role = Role::Candidate;

    #[test]
    fn greeting_and_reply_closes_engagement() {
        let convo = conversation("c1", &[(AI, "Hi, welcome!", 0), (ME, "Thanks", 1)]);
        let result = classify(&convo);

        assert_eq!(kinds(&result), vec![StageKind::Engagement]);
        assert!(result.stages[0].completed);
        assert!(!result.decision_made);
        assert_eq!(result.dropped_at, Some(StageKind::Engagement));
        assert_eq!(result.current_stage.as_deref(), Some("AI Engagement"));
        assert_eq!(result.total_duration_ms, 60_000);
    }

    #[test]
    fn confirmed_slot_completes_the_process() {
        let convo = conversation(
            "c2",
            &[
                (AI, "Hi, welcome!", 0),
                (ME, "Hello", 1),
                (AI, "Let's schedule your interview: Monday 10:00-10:30 CDMX", 2),
                (ME, "2", 3),
                (AI, "Great, you've selected a time, I'll send a calendar invite", 4),
            ],
        );
        let result = classify(&convo);

        assert_eq!(
            kinds(&result),
            vec![
                StageKind::Engagement,
                StageKind::Scheduling,
                StageKind::Completed
            ]
        );
        assert!(result.decision_made);
        assert_eq!(result.decision_timestamp, Some(base_time() + Duration::minutes(4)));
        assert_eq!(result.dropped_at, None);
        assert!(result.stages.iter().all(|s| s.completed && !s.synthetic));
        assert_eq!(result.stages[1].id, "scheduling_2");
    }

    #[test]
    fn interview_questions_are_capped_at_ten() {
        let questions: Vec<String> = (1..=12)
            .map(|i| format!("Question {i}: what did you learn from your last role?"))
            .collect();
        let mut turns: Vec<(Role, &str, i64)> = vec![(AI, "Hi, welcome!", 0)];
        for (i, q) in questions.iter().enumerate() {
            let minute = (i as i64 + 1) * 2;
            turns.push((AI, q.as_str(), minute));
            turns.push((ME, "An answer", minute + 1));
        }
        let result = classify(&conversation("c3", &turns));

        let labels: Vec<String> = result.stages.iter().filter_map(|s| s.sub_stage.clone()).collect();
        let expected: Vec<String> = (1..=10).map(|n| format!("2.{n}")).collect();
        assert_eq!(labels, expected);
        assert_eq!(
            result.stages.last().map(|s| s.name.as_str()),
            Some("Interview Question 10")
        );
        assert_eq!(result.dropped_at, Some(StageKind::Interview));
    }

    #[test]
    fn only_the_first_scheduling_proposal_is_recorded() {
        let convo = conversation(
            "c4",
            &[
                (AI, "Welcome aboard", 0),
                (AI, "These are the times available: Monday or Tuesday", 1),
                (AI, "Also Wednesday afternoon works", 2),
            ],
        );
        let result = classify(&convo);

        assert_eq!(
            kinds(&result),
            vec![StageKind::Engagement, StageKind::Scheduling]
        );
        assert_eq!(result.dropped_at, Some(StageKind::Scheduling));
    }

    #[test]
    fn confirmation_without_a_reply_is_not_completion() {
        let convo = conversation(
            "c5",
            &[
                (AI, "Welcome aboard", 0),
                (ME, "Hi", 1),
                (AI, "Let's schedule your interview on Monday", 2),
                (AI, "Great, you selected a time, meeting scheduled", 3),
            ],
        );
        let result = classify(&convo);

        assert_eq!(
            kinds(&result),
            vec![StageKind::Engagement, StageKind::Scheduling]
        );
        assert!(!result.decision_made);
    }

    #[test]
    fn conversation_without_recruiter_messages_is_empty() {
        let convo = conversation("c6", &[(ME, "Hello?", 0), (ME, "Anyone there?", 5)]);
        let result = classify(&convo);

        assert!(result.stages.is_empty());
        assert!(!result.decision_made);
        assert_eq!(result.dropped_at, None);
        assert_eq!(result.current_stage, None);
    }

    #[test]
    fn empty_conversation_has_zero_duration() {
        let result = classify(&conversation("c7", &[]));
        assert!(result.stages.is_empty());
        assert_eq!(result.total_duration_ms, 0);
        assert_eq!(result.started_at, None);
    }

    #[test]
    fn closing_turns_imply_scheduling_and_completion() {
        let convo = conversation(
            "c8",
            &[
                (AI, "Welcome! We will contact you about next steps.", 0),
                (ME, "Great", 1),
                (ME, "Looking forward to it", 2),
                (ME, "Any update?", 30),
                (ME, "Thanks for confirming my interview", 60),
            ],
        );
        let result = classify(&convo);

        assert_eq!(
            kinds(&result),
            vec![
                StageKind::Engagement,
                StageKind::Scheduling,
                StageKind::Completed
            ]
        );
        let synthetic: Vec<&str> = result
            .stages
            .iter()
            .filter(|s| s.synthetic)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(synthetic, vec!["scheduling_implicit", "completed_implicit"]);
        assert!(result.decision_made);
        assert_eq!(result.decision_timestamp, Some(base_time() + Duration::minutes(60)));
    }

    #[test]
    fn four_messages_are_too_short_for_the_fallback() {
        let convo = conversation(
            "c9",
            &[
                (AI, "Welcome! We will contact you about next steps.", 0),
                (ME, "Great", 1),
                (ME, "Any update?", 2),
                (ME, "Thanks for confirming my interview", 3),
            ],
        );
        let result = classify(&convo);
        assert_eq!(kinds(&result), vec![StageKind::Engagement]);
        assert_eq!(result.dropped_at, Some(StageKind::Engagement));
    }

    #[test]
    fn fallback_needs_the_candidate_to_speak_last() {
        let convo = conversation(
            "c9b",
            &[
                (ME, "hi", 0),
                (ME, "hi", 1),
                (ME, "hi", 2),
                (ME, "hi", 3),
                (AI, "We will contact you soon", 4),
            ],
        );
        let result = classify(&convo);
        assert_eq!(kinds(&result), vec![StageKind::Engagement]);
        assert!(result.stages.iter().all(|s| !s.synthetic));
        assert!(!result.decision_made);
    }

    #[test]
    fn fallback_completion_reads_the_final_message() {
        let convo = conversation(
            "c9c",
            &[
                (AI, "Welcome! We will contact you about next steps.", 0),
                (ME, "Thanks for confirming my interview", 1),
                (ME, "Great", 2),
                (ME, "Looking forward to it", 3),
                (ME, "See you", 4),
            ],
        );
        let result = classify(&convo);
        assert_eq!(kinds(&result), vec![StageKind::Engagement, StageKind::Scheduling]);
        assert!(result.stages[1].synthetic);
        assert!(!result.decision_made);
    }

    #[test]
    fn unsorted_timestamps_keep_list_order() {
        let convo = conversation(
            "c10",
            &[
                (AI, "Hi there", 10),
                (AI, "Tell me about your experience with Rust", 5),
                (ME, "Five years", 12),
            ],
        );
        let result = classify(&convo);

        assert_eq!(
            kinds(&result),
            vec![StageKind::Engagement, StageKind::Interview]
        );
        assert_eq!(result.total_duration_ms, 2 * 60_000);
    }

    #[test]
    fn first_recruiter_message_engages_whatever_it_says() {
        let mut state = ClassifierState::default();
        let transition = state.on_agent_message(0, 3, "Please confirm a slot on Monday");
        assert_eq!(transition, Some(Transition::Engage));
        assert_eq!(state.phase, Phase::Engagement);
        assert!(!state.scheduling_proposed);
    }

    #[test]
    fn completion_check_needs_a_candidate_reply() {
        let mut state = ClassifierState {
            phase: Phase::Scheduling,
            questions_asked: 2,
            scheduling_proposed: true,
        };
        assert_eq!(state.on_agent_message(5, 10, "Meeting scheduled!"), None);

        state.on_candidate_message();
        assert_eq!(state.phase, Phase::SchedulingResponded);
        assert_eq!(
            state.on_agent_message(7, 10, "Meeting scheduled!"),
            Some(Transition::ConfirmSchedule)
        );
        assert_eq!(state.phase, Phase::Completed);
        assert_eq!(state.on_agent_message(8, 10, "Any questions?"), None);
    }

    #[test]
    fn next_round_wording_counts_only_late() {
        let engaged = ClassifierState {
            phase: Phase::Engagement,
            questions_asked: 0,
            scheduling_proposed: false,
        };

        let mut early = engaged;
        assert_eq!(
            early.on_agent_message(1, 10, "Is the next round ok?"),
            Some(Transition::Ask(1))
        );

        let mut late = engaged;
        assert_eq!(
            late.on_agent_message(8, 10, "Is the next round ok?"),
            Some(Transition::ProposeSchedule)
        );

        let mut experienced = ClassifierState {
            phase: Phase::Interview,
            questions_asked: 5,
            scheduling_proposed: false,
        };
        assert_eq!(
            experienced.on_agent_message(1, 40, "Ready for the next round?"),
            Some(Transition::ProposeSchedule)
        );
    }

    #[test]
    fn statements_in_interview_phase_are_ignored() {
        let mut state = ClassifierState {
            phase: Phase::Interview,
            questions_asked: 3,
            scheduling_proposed: true,
        };
        assert_eq!(state.on_agent_message(6, 10, "Thanks, that helps."), None);
        assert_eq!(state.questions_asked, 3);
    }

    const VOCABULARY: &[&str] = &[
        "Hi, welcome!",
        "What is your experience with SQL?",
        "Why this company?",
        "Thanks for sharing.",
        "Let's schedule your interview: Monday 10:00",
        "Great, you selected a time, calendar invitation sent",
        "2",
        "Thanks for confirming",
        "Sure, next round sounds good",
    ];

    fn arb_turns() -> impl Strategy<Value = Vec<(bool, usize)>> {
        prop::collection::vec((any::<bool>(), 0..VOCABULARY.len()), 0..40)
    }

    fn build(turns: &[(bool, usize)]) -> Conversation {
        let owned: Vec<(Role, &str, i64)> = turns
            .iter()
            .enumerate()
            .map(|(i, (agent, word))| {
                let role = if *agent { AI } else { ME };
                (role, VOCABULARY[*word], i as i64)
            })
            .collect();
        conversation("prop", &owned)
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(turns in arb_turns()) {
            let convo = build(&turns);
            prop_assert_eq!(classify(&convo), classify(&convo));
        }

        #[test]
        fn agent_opening_is_always_engagement(mut turns in arb_turns(), word in 0..VOCABULARY.len()) {
            turns.insert(0, (true, word));
            let result = classify(&build(&turns));
            prop_assert_eq!(result.stages[0].kind, StageKind::Engagement);
        }

        #[test]
        fn never_more_than_ten_questions(turns in arb_turns()) {
            let result = classify(&build(&turns));
            let asked = result.stages.iter().filter(|s| s.kind == StageKind::Interview).count();
            prop_assert!(asked <= MAX_INTERVIEW_QUESTIONS as usize);
        }

        #[test]
        fn decision_is_preceded_by_scheduling(turns in arb_turns()) {
            let result = classify(&build(&turns));
            if result.decision_made {
                let completed_at = result
                    .stages
                    .iter()
                    .position(|s| s.kind == StageKind::Completed)
                    .unwrap();
                prop_assert!(result.stages[..completed_at]
                    .iter()
                    .any(|s| s.kind == StageKind::Scheduling));
            }
        }
    }
}
