//! Structural validation of generated coach turns.
//!
//! Pattern rules live in a versioned table so the rule set can be tested and
//! extended on its own. Structural checks (question count, synthesis, phase
//! and variety) need the conversation state and are evaluated separately.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::moves::ResponseMove;
use super::phase::ConversationPhase;
use super::state::ConversationState;

/// Bumped whenever a rule is added, removed or changes meaning.
pub const RULESET_VERSION: u32 = 1;

const SYNTHESIS_PHRASES: [&str; 6] = [
    "so far",
    "understanding that",
    "i'm hearing",
    "let me check",
    "what i'm getting",
    "to summarize",
];

const CORRECTIONS_HEADER: &str = "## CORRECTIONS REQUIRED";

static DEFAULT_RULES: Lazy<Vec<ValidationRule>> = Lazy::new(|| {
    use IssueCategory::*;
    [
        (
            "opener.understood",
            r"(?i)^\s*understood\b",
            RoboticOpener,
            "Response opens with \"Understood\"",
        ),
        (
            "opener.got_it",
            r"(?i)^\s*got it\b",
            RoboticOpener,
            "Response opens with \"Got it\"",
        ),
        (
            "shallow.category",
            r"(?i)\bwhat (?:kind|type|category) of\b",
            ShallowQuestion,
            "Asks for a category instead of meaning",
        ),
        (
            "shallow.forced_choice",
            r"(?i)\bwould you prefer (?:a|b|c)\b",
            ShallowQuestion,
            "Offers a forced choice between options",
        ),
        (
            "shallow.which_of_these",
            r"(?i)\bwhich of these\b",
            ShallowQuestion,
            "Asks the user to pick from a list",
        ),
        (
            "shallow.what_new",
            r"(?i)\bwhat new \w+ would you\b",
            ShallowQuestion,
            "Jumps to solutions before understanding",
        ),
    ]
    .into_iter()
    .map(|(id, pattern, category, message)| ValidationRule {
        id,
        pattern: Regex::new(pattern).expect("validation pattern compiles"),
        category,
        message,
    })
    .collect()
});

static OPENER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:understood|got it)\b[.,!]?\s*").expect("opener pattern compiles")
});

/// What kind of rule a generated turn broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    RoboticOpener,
    ShallowQuestion,
    MultipleQuestions,
    MissingSynthesis,
    PhaseMismatch,
    RepeatedQuestion,
}

impl IssueCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RoboticOpener => "robotic_opener",
            Self::ShallowQuestion => "shallow_question",
            Self::MultipleQuestions => "multiple_questions",
            Self::MissingSynthesis => "missing_synthesis",
            Self::PhaseMismatch => "phase_mismatch",
            Self::RepeatedQuestion => "repeated_question",
        }
    }

    /// Instruction appended to the next generation attempt.
    fn correction(&self, phase: ConversationPhase) -> String {
        match self {
            Self::RoboticOpener => "Do not start with \"Understood\" or \"Got it\". \
                 Engage directly with what the user just said."
                .to_string(),
            Self::ShallowQuestion => "Do not ask category or multiple-choice questions. \
                 Ask about what this means to them or how it feels."
                .to_string(),
            Self::MultipleQuestions => "Ask at most ONE question in the response.".to_string(),
            Self::MissingSynthesis => "Include a short synthesis of what you have understood \
                 so far before moving on (for example \"What I'm hearing so far is...\")."
                .to_string(),
            Self::PhaseMismatch => {
                let moves: Vec<&str> = phase.allowed_moves().iter().map(|m| m.label()).collect();
                format!(
                    "The {} phase only allows these moves: {}. Pick one of them.",
                    phase.label(),
                    moves.join(", ")
                )
            }
            Self::RepeatedQuestion => "The last two turns were questions. \
                 Respond with a reflection or observation instead of another question."
                .to_string(),
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the pattern rule table.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub id: &'static str,
    pub pattern: Regex,
    pub category: IssueCategory,
    pub message: &'static str,
}

/// A violated rule found in a generated turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub rule_id: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(category: IssueCategory, rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            category,
            rule_id: rule_id.to_string(),
            message: message.into(),
        }
    }
}

/// Checks generated turns and patches what can be patched mechanically.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    rules: Vec<ValidationRule>,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseValidator {
    /// Validator with the built-in rule table.
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Adds a pattern rule to the table.
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Returns one issue per violated rule, in table order followed by the
    /// structural checks.
    pub fn validate(
        &self,
        text: &str,
        response_move: ResponseMove,
        state: &ConversationState,
    ) -> Vec<ValidationIssue> {
        let mut issues: Vec<ValidationIssue> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.is_match(text))
            .map(|rule| ValidationIssue::new(rule.category, rule.id, rule.message))
            .collect();

        let questions = text.matches('?').count();
        if questions > 1 {
            issues.push(ValidationIssue::new(
                IssueCategory::MultipleQuestions,
                "structure.question_count",
                format!("Response asks {} questions", questions),
            ));
        }

        if state.needs_synthesis() && !contains_synthesis(text) {
            issues.push(ValidationIssue::new(
                IssueCategory::MissingSynthesis,
                "structure.synthesis",
                format!(
                    "{} exchanges since the last synthesis",
                    state.exchanges_since_synthesis()
                ),
            ));
        }

        if !state.current_phase.allows(response_move) {
            issues.push(ValidationIssue::new(
                IssueCategory::PhaseMismatch,
                "structure.phase_move",
                format!(
                    "{} is not allowed in the {} phase",
                    response_move.label(),
                    state.current_phase.label()
                ),
            ));
        }

        if response_move == ResponseMove::DeepeningQuestion
            && state.recent_moves(2) == [ResponseMove::DeepeningQuestion; 2]
        {
            issues.push(ValidationIssue::new(
                IssueCategory::RepeatedQuestion,
                "structure.move_variety",
                "Third deepening question in a row",
            ));
        }

        issues
    }

    /// Builds the correction block for the next attempt: one instruction per
    /// distinct category, in first-seen order. `None` when there is nothing
    /// to correct.
    pub fn correction_block(
        issues: &[ValidationIssue],
        phase: ConversationPhase,
    ) -> Option<String> {
        if issues.is_empty() {
            return None;
        }

        let mut categories: Vec<IssueCategory> = Vec::new();
        for issue in issues {
            if !categories.contains(&issue.category) {
                categories.push(issue.category);
            }
        }

        let mut block = format!(
            "{}\nYour previous response broke these rules. Fix every one of them:\n",
            CORRECTIONS_HEADER
        );
        for category in categories {
            block.push_str("- ");
            block.push_str(&category.correction(phase));
            block.push('\n');
        }
        Some(block)
    }

    /// Best-effort repair once regenerations are exhausted.
    ///
    /// Only openers, shallow questions and question count are patched.
    /// Synthesis and phase problems are left for the caller to report.
    /// A turn made only of shallow questions is left as is and the issue
    /// stays in the residual list. The question count is always brought
    /// down to one.
    pub fn apply_mechanical_fixes(&self, text: &str, issues: &[ValidationIssue]) -> String {
        let has = |category: IssueCategory| issues.iter().any(|i| i.category == category);
        let mut fixed = text.trim().to_string();

        if has(IssueCategory::RoboticOpener) {
            let stripped = OPENER_PREFIX.replace(&fixed, "").into_owned();
            if !stripped.trim().is_empty() {
                fixed = capitalize_first(stripped.trim());
            }
        }

        if has(IssueCategory::ShallowQuestion) {
            let sentences = split_sentences(&fixed);
            let kept: Vec<&str> = sentences
                .iter()
                .copied()
                .filter(|s| !self.is_shallow(s))
                .collect();
            if !kept.is_empty() && kept.len() < sentences.len() {
                fixed = kept.join(" ");
            }
        }

        if has(IssueCategory::MultipleQuestions) && fixed.matches('?').count() > 1 {
            fixed = keep_last_question(&fixed);
        }

        fixed
    }

    fn is_shallow(&self, sentence: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.category == IssueCategory::ShallowQuestion && r.pattern.is_match(sentence))
    }
}

fn contains_synthesis(text: &str) -> bool {
    let lower = text.to_lowercase().replace('’', "'");
    SYNTHESIS_PHRASES.iter().any(|p| lower.contains(p))
}

const CLOSERS: [char; 6] = ['"', '\'', ')', ']', '”', '’'];

/// Splits after a run of `.`, `?` or `!` (plus any closing quotes or
/// brackets) when the next character is whitespace. A `?` or `!` run also
/// splits before an uppercase letter with no space in between.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        let mut asks = c != '.';
        while let Some(&(_, next)) = chars.peek() {
            if !matches!(next, '.' | '?' | '!') && !CLOSERS.contains(&next) {
                break;
            }
            asks |= matches!(next, '?' | '!');
            chars.next();
        }

        let boundary = match chars.peek() {
            Some(&(idx, next)) if next.is_whitespace() || (asks && next.is_uppercase()) => idx,
            _ => continue,
        };
        sentences.push(text[start..boundary].trim());
        start = boundary;
    }
    sentences.push(text[start..].trim());
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Keeps every statement plus the last question, in original order.
///
/// Falls back to the final `?`-terminated clause when a single sentence
/// still carries more than one question mark.
fn keep_last_question(text: &str) -> String {
    let sentences = split_sentences(text);
    let last_question = sentences.iter().rposition(|s| is_question(s));

    let kept = sentences
        .iter()
        .enumerate()
        .filter(|(idx, s)| !is_question(s) || Some(*idx) == last_question)
        .map(|(_, s)| *s)
        .collect::<Vec<_>>()
        .join(" ");

    if kept.matches('?').count() <= 1 {
        return kept;
    }
    final_question_clause(&kept)
}

fn is_question(sentence: &str) -> bool {
    sentence.contains('?')
}

/// Text between the second-to-last and the last `?`, inclusive of the latter.
fn final_question_clause(text: &str) -> String {
    let Some(last) = text.rfind('?') else {
        return text.to_string();
    };
    let from = text[..last].rfind('?').map_or(0, |idx| idx + 1);
    let clause = text[from..=last].trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '.' | '!') || CLOSERS.contains(&c)
    });
    capitalize_first(clause)
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(issues: &[ValidationIssue]) -> Vec<IssueCategory> {
        issues.iter().map(|i| i.category).collect()
    }

    fn exploring() -> ConversationState {
        ConversationState {
            current_phase: ConversationPhase::Exploration,
            total_exchange_count: 2,
            phase_exchange_count: 1,
            ..Default::default()
        }
    }

    mod rules {
        use super::*;

        #[test]
        fn clean_turn_has_no_issues() {
            let issues = ResponseValidator::new().validate(
                "That sounds exhausting, especially when effort stops paying off.",
                ResponseMove::Reflection,
                &exploring(),
            );
            assert!(issues.is_empty());
        }

        #[test]
        fn robotic_opener_ignores_case_and_leading_space() {
            let validator = ResponseValidator::new();
            for text in ["Understood. Tell me more.", "  GOT IT, that helps."] {
                let issues = validator.validate(text, ResponseMove::Reflection, &exploring());
                assert_eq!(categories(&issues), vec![IssueCategory::RoboticOpener]);
            }
            let fine = validator.validate(
                "I understood that differently.",
                ResponseMove::Reflection,
                &exploring(),
            );
            assert!(fine.is_empty());
        }

        #[test]
        fn shallow_question_matches_category_pattern() {
            let issues = ResponseValidator::new().validate(
                "What kind of hobby are you looking for?",
                ResponseMove::DeepeningQuestion,
                &exploring(),
            );
            assert_eq!(categories(&issues), vec![IssueCategory::ShallowQuestion]);
            assert_eq!(issues[0].rule_id, "shallow.category");
        }

        #[test]
        fn each_violated_rule_is_reported_once() {
            let issues = ResponseValidator::new().validate(
                "Which of these appeals? What type of role would you like?",
                ResponseMove::DeepeningQuestion,
                &exploring(),
            );
            assert_eq!(
                categories(&issues),
                vec![
                    IssueCategory::ShallowQuestion,
                    IssueCategory::ShallowQuestion,
                    IssueCategory::MultipleQuestions
                ]
            );
        }

        #[test]
        fn custom_rules_extend_the_table() {
            let validator = ResponseValidator::new().with_rule(ValidationRule {
                id: "shallow.scale",
                pattern: Regex::new(r"(?i)on a scale of").unwrap(),
                category: IssueCategory::ShallowQuestion,
                message: "Asks for a rating",
            });
            assert_eq!(validator.rules().len(), DEFAULT_RULES.len() + 1);
            let issues = validator.validate(
                "On a scale of one to ten, how bad is it?",
                ResponseMove::DeepeningQuestion,
                &exploring(),
            );
            assert_eq!(issues[0].rule_id, "shallow.scale");
        }
    }

    mod structure {
        use super::*;

        #[test]
        fn missing_synthesis_when_due() {
            let state = ConversationState {
                current_phase: ConversationPhase::Exploration,
                total_exchange_count: 3,
                last_synthesis_exchange: 0,
                ..Default::default()
            };
            let validator = ResponseValidator::new();

            let issues = validator.validate(
                "That sounds hard.",
                ResponseMove::Reflection,
                &state,
            );
            assert_eq!(categories(&issues), vec![IssueCategory::MissingSynthesis]);

            let ok = validator.validate(
                "What I’m hearing is that effort stopped paying off.",
                ResponseMove::Reflection,
                &state,
            );
            assert!(ok.is_empty());
        }

        #[test]
        fn repeated_question_after_two_questions() {
            let mut state = exploring();
            state.record_move(ResponseMove::DeepeningQuestion);
            state.record_move(ResponseMove::DeepeningQuestion);

            let issues = ResponseValidator::new().validate(
                "What makes that feel pointless?",
                ResponseMove::DeepeningQuestion,
                &state,
            );
            assert_eq!(categories(&issues), vec![IssueCategory::RepeatedQuestion]);
        }

        #[test]
        fn variety_only_checks_last_two_moves() {
            let mut state = exploring();
            state.record_move(ResponseMove::DeepeningQuestion);
            state.record_move(ResponseMove::Reflection);
            state.record_move(ResponseMove::DeepeningQuestion);

            let issues = ResponseValidator::new().validate(
                "What makes that feel pointless?",
                ResponseMove::DeepeningQuestion,
                &state,
            );
            assert!(issues.is_empty());
        }

        #[test]
        fn phase_mismatch_in_closing() {
            let state = ConversationState {
                current_phase: ConversationPhase::Closing,
                ..Default::default()
            };
            let issues = ResponseValidator::new().validate(
                "What would change if you left?",
                ResponseMove::DeepeningQuestion,
                &state,
            );
            assert_eq!(categories(&issues), vec![IssueCategory::PhaseMismatch]);
            assert!(issues[0].message.contains("CLOSING"));
        }
    }

    mod corrections {
        use super::*;

        #[test]
        fn empty_issues_have_no_block() {
            assert!(ResponseValidator::correction_block(&[], ConversationPhase::Opening).is_none());
        }

        #[test]
        fn one_instruction_per_category() {
            let issues = ResponseValidator::new().validate(
                "Got it. Which of these appeals? What type of role would you like?",
                ResponseMove::Challenge,
                &exploring(),
            );
            let block =
                ResponseValidator::correction_block(&issues, ConversationPhase::Exploration)
                    .unwrap();

            assert!(block.starts_with("## CORRECTIONS REQUIRED"));
            let instructions = block.lines().filter(|l| l.starts_with("- ")).count();
            // opener, shallow, multiple questions, phase mismatch
            assert_eq!(instructions, 4);
            assert!(block.contains("REFLECTION, DEEPENING_QUESTION, OBSERVATION"));
        }
    }

    mod fixes {
        use super::*;

        fn fix(text: &str) -> String {
            let validator = ResponseValidator::new();
            let issues = validator.validate(text, ResponseMove::Reflection, &exploring());
            validator.apply_mechanical_fixes(text, &issues)
        }

        #[test]
        fn strips_opener_and_capitalizes() {
            assert_eq!(fix("Got it, you feel stuck."), "You feel stuck.");
            assert_eq!(fix("Understood. That is a lot."), "That is a lot.");
        }

        #[test]
        fn keeps_statements_and_last_question() {
            assert_eq!(
                fix("That sounds heavy. Why now? What changed? It matters."),
                "That sounds heavy. What changed? It matters."
            );
        }

        #[test]
        fn all_questions_keep_only_the_last() {
            assert_eq!(fix("Why now? What changed?"), "What changed?");
        }

        #[test]
        fn drops_shallow_sentence_when_content_remains() {
            assert_eq!(
                fix("That sounds draining. What kind of job would suit you?"),
                "That sounds draining."
            );
        }

        #[test]
        fn interrobang_keeps_the_last_question() {
            assert_eq!(
                fix("Really?! What do you want from it?!"),
                "What do you want from it?!"
            );
        }

        #[test]
        fn unspaced_questions_are_split() {
            assert_eq!(
                fix("Is it the pay?Or is it the people?"),
                "Or is it the people?"
            );
        }

        #[test]
        fn quoted_question_is_dropped() {
            assert_eq!(
                fix("You keep asking \"why me?\" What would change if you knew?"),
                "What would change if you knew?"
            );
        }

        #[test]
        fn run_on_questions_reduce_to_the_final_clause() {
            assert_eq!(fix("is it the pay?or the people?"), "Or the people?");
        }

        #[test]
        fn shallow_only_text_is_kept() {
            let text = "What kind of job would suit you?";
            assert_eq!(fix(text), text);
        }

        #[test]
        fn synthesis_and_phase_issues_are_not_patched() {
            let validator = ResponseValidator::new();
            let issues = vec![
                ValidationIssue::new(IssueCategory::MissingSynthesis, "structure.synthesis", "x"),
                ValidationIssue::new(IssueCategory::PhaseMismatch, "structure.phase_move", "y"),
            ];
            assert_eq!(
                validator.apply_mechanical_fixes("That sounds hard.", &issues),
                "That sounds hard."
            );
        }

        #[test]
        fn fixed_turn_passes_opener_and_question_checks() {
            let text = "Got it. Why now? What type of work drains you? What changed?";
            let fixed = fix(text);
            let issues = ResponseValidator::new().validate(&fixed, ResponseMove::Reflection, &exploring());
            assert!(issues.iter().all(|i| !matches!(
                i.category,
                IssueCategory::RoboticOpener | IssueCategory::MultipleQuestions
            )));
        }
    }

    #[test]
    fn split_keeps_closing_quotes_with_their_sentence() {
        assert_eq!(
            split_sentences("He said \"no.\" Then left?!Why"),
            vec!["He said \"no.\"", "Then left?!", "Why"]
        );
    }

    #[test]
    fn split_does_not_break_abbreviations_before_capitals() {
        assert_eq!(split_sentences("Moving to the U.S. soon"), vec!["Moving to the U.S.", "soon"]);
        assert_eq!(split_sentences("Working for U.N.Aid"), vec!["Working for U.N.Aid"]);
    }

    #[test]
    fn split_handles_trailing_text_without_punctuation() {
        assert_eq!(
            split_sentences("One. Two? three"),
            vec!["One.", "Two?", "three"]
        );
    }
}
