//! Bilingual (English/Spanish) phrase tables used to tag recruiter messages.
//!
//! Each table is an ordered list of matchers for one stage. The tables are
//! independent of the sequencing rules in `classifier`; adding a rule here
//! only widens what a stage accepts, it never changes check order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::StageKind;

pub struct RuleSet {
    pub stage: StageKind,
    rules: Vec<Regex>,
}

impl RuleSet {
    fn compile(stage: StageKind, patterns: &[&str]) -> Self {
        Self {
            stage,
            rules: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
        }
    }

    /// First rule that matches `text`, in table order.
    pub fn first_match(&self, text: &str) -> Option<&Regex> {
        self.rules.iter().find(|rule| rule.is_match(text))
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }
}

/// Experience, skills and motivation phrasing.
pub static INTERVIEW_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::compile(
        StageKind::Interview,
        &[
            r"(?i)experience|project|skills|worked with|proficient|comfortable with|familiar with",
            r"(?i)how do you|what.*approach|describe.*time|can you explain",
            r"(?i)interested|why.*company|what.*draws you|what.*motivates",
            r"(?i)tell me about a time|give me an example|describe a situation",
        ],
    )
});

/// The recruiter proposing concrete slots for the HR interview.
pub static SCHEDULING_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::compile(
        StageKind::Scheduling,
        &[
            r"(?i)momento.*agendar.*llamada|time.*schedule.*call",
            r"(?i)llamada.*\d+.*minutos|call.*\d+.*minutes",
            r"(?i)equipo.*factor.*humano|equipo.*HR|HR.*team|human.*resources",
            r"(?i)horarios.*que.*tenemos|slots.*available|times.*available",
            r"(?i)estos.*son.*los.*horarios|these.*are.*the.*times",
            // dd/mm/yyyy
            r"\d{1,2}/\d{1,2}/\d{4}",
            // "10:00 a 10:30"
            r"\d{1,2}:\d{2}\s*a\s*\d{1,2}:\d{2}",
            r"(?i)hora.*de.*CDMX|hora.*de.*\w+|timezone",
            r"(?i)responde.*con.*el.*número|respond.*with.*number",
            r"(?i)opción.*que.*te.*funciona|option.*that.*works",
            r"(?i)ej\.\s*1.*2.*3.*4|e\.g\.\s*1.*2.*3.*4",
            r"(?i)available.*slots?|available.*times?|following.*dates?|following.*times?",
            r"(?i)schedule.*interview|book.*interview|arrange.*meeting|set.*up.*interview",
            r"(?i)Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday",
            r"(?i)Lunes|Martes|Miércoles|Jueves|Viernes|Sábado|Domingo",
            r"(?i)\d{1,2}:\d{2}\s*(am|pm)|morning|afternoon|evening",
            r"(?i)please.*confirm|let.*know.*works|choose.*slot|select.*time",
            r"(?i)por.*favor.*responde|please.*respond",
            r"(?i)we'll.*be.*in.*touch|we.*will.*contact.*you",
            r"(?i)get.*back.*to.*you|reach.*out.*soon",
            r"(?i)next.*steps|moving.*forward",
        ],
    )
});

/// The recruiter confirming the chosen slot or sending the calendar invite.
pub static COMPLETION_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::compile(
        StageKind::Completed,
        &[
            r"(?i)genial.*has.*seleccionado.*horario|great.*you.*selected.*time",
            r"(?i)has.*seleccionado.*el.*horario|you.*have.*selected.*the.*time",
            r"(?i)tu.*entrevista.*con.*el.*equipo|your.*interview.*with.*team",
            r"(?i)voy.*a.*proceder.*a.*agendar|going.*to.*proceed.*schedule",
            r"(?i)proceder.*a.*agendar|proceed.*to.*schedule",
            r"(?i)te.*enviaré.*una.*invitación|send.*you.*invitation",
            r"(?i)enviaré.*invitación.*email|send.*invitation.*email",
            r"(?i)agendada.*exitosamente|successfully.*scheduled",
            r"(?i)confirmada.*tu.*entrevista|confirmed.*your.*interview",
            r"(?i)invitación.*calendario|calendar.*invit",
            r"(?i)nos.*vemos.*pronto.*entrevista|see.*you.*soon.*interview",
            r"(?i)gracias.*por.*confirmar|thanks.*for.*confirming",
            r"(?i)invitación.*al.*email|invitation.*to.*email",
            r"(?i)recibirás.*confirmación|receive.*confirmation",
            r"(?i)meeting.*scheduled|reunión.*agendada",
            r"(?i)appointment.*confirmed|cita.*confirmada",
            r"(?i)interview.*scheduled|entrevista.*agendada",
            r"(?i)booking.*confirmed|reserva.*confirmada",
            r"(?i)see.*you.*at.*interview|nos.*vemos.*en.*entrevista",
        ],
    )
});

/// Loose "next step / next interview / next round" wording. Only meaningful
/// late in a conversation, see `classifier`.
pub fn mentions_next_step(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("next")
        && (lower.contains("step") || lower.contains("interview") || lower.contains("round"))
}
