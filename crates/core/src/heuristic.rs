//! Deciding when the survey has gathered enough.
//!
//! A [`CompletionPolicy`] only advises the remote model. The survey ends
//! when the model actually says the closing phrase (see
//! [`is_conclusion`]), or when a policy forces the end outright.

use std::fmt::Debug;
use std::time::Duration;

use crate::conversation::Conversation;

/// The phrase the model is told to close the survey with.
pub const TERMINAL_PHRASE: &str = "perfect, thanks";

/// Returns whether a completed assistant turn concludes the survey.
#[inline]
pub fn is_conclusion(content: &str) -> bool {
    content.to_lowercase().contains(TERMINAL_PHRASE)
}

/// What the policy sees.
#[derive(Clone, Copy, Debug)]
pub struct PolicyInput<'a> {
    /// The conversation, including the user turn just submitted.
    pub conversation: &'a Conversation,
    /// Time since the session started.
    pub elapsed: Duration,
}

/// The policy's verdict for the next request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Assessment {
    /// Ask the model to conclude.
    pub should_conclude: bool,
    /// Ask the model for one final question.
    pub is_session_ending: bool,
    /// End the session without waiting for the closing phrase.
    pub force_ending: bool,
}

/// A pluggable completion heuristic.
pub trait CompletionPolicy: Debug + Send + Sync + 'static {
    /// Assesses the session.
    fn assess(&self, input: &PolicyInput<'_>) -> Assessment;
}

/// Survey topics tracked by [`ContentPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Role and team size.
    RoleAndTeam,
    /// Remote, office or hybrid.
    LocationSetup,
    /// Named workflow tools.
    Tools,
    /// AI tool usage.
    AiUsage,
    /// Company stage and industry.
    StageAndIndustry,
}

impl Category {
    /// Every category, in a fixed order.
    pub const ALL: [Category; 5] = [
        Category::RoleAndTeam,
        Category::LocationSetup,
        Category::Tools,
        Category::AiUsage,
        Category::StageAndIndustry,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::RoleAndTeam => &[
                "ceo", "cto", "coo", "cpo", "founder", "co-founder",
                "cofounder", "engineer", "engineers", "developer", "designer",
                "product manager", "head of", "tech lead", "team lead",
                "engineering lead", "employees", "team of", "headcount",
                "solo",
            ],
            Category::LocationSetup => &[
                "remote", "office", "hybrid", "distributed", "in-person",
                "onsite", "on-site", "co-located", "wfh", "async",
            ],
            Category::Tools => &[
                "slack", "notion", "jira", "linear", "asana", "trello",
                "github", "gitlab", "confluence", "figma", "clickup",
                "monday", "microsoft teams", "ms teams", "zoom", "discord",
                "google docs", "airtable", "coda", "loom",
            ],
            Category::AiUsage => &[
                "ai", "claude", "chatgpt", "gpt", "copilot", "cursor",
                "openai", "anthropic", "gemini", "llm", "llms",
            ],
            Category::StageAndIndustry => &[
                "pre-seed", "seed", "series a", "series b", "series c",
                "bootstrapped", "mvp", "revenue", "fintech", "healthtech",
                "edtech", "saas", "b2b", "b2c", "e-commerce", "ecommerce",
                "marketplace", "enterprise", "consumer app", "consumer apps",
                "consumer product", "d2c", "dtc",
            ],
        }
    }
}

// Lowercases and reduces every run of non-alphanumeric characters to a
// single space, padded on both ends so that phrases can be matched on word
// boundaries with a plain substring search.
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + 2);
    normalized.push(' ');
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            normalized.push(ch);
        } else if !normalized.ends_with(' ') {
            normalized.push(' ');
        }
    }
    if !normalized.ends_with(' ') {
        normalized.push(' ');
    }
    normalized
}

const NUMBER_WORDS: &[&str] = &[
    "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "fifteen", "twenty", "thirty", "fifty", "dozen",
];

// "8 people", "a five-person team". A bare "people" says nothing about size.
fn mentions_headcount(normalized: &str) -> bool {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words.windows(2).any(|pair| {
        matches!(pair[1], "people" | "person" | "persons")
            && (pair[0].chars().all(|c| c.is_ascii_digit())
                || NUMBER_WORDS.contains(&pair[0]))
    })
}

/// Returns the categories mentioned in `text`.
pub fn category_hits(text: &str) -> Vec<Category> {
    let text = normalize(text);
    Category::ALL
        .into_iter()
        .filter(|category| {
            category
                .keywords()
                .iter()
                .any(|keyword| text.contains(&normalize(keyword)))
                || (*category == Category::RoleAndTeam && mentions_headcount(&text))
        })
        .collect()
}

/// Concludes once enough topics have been covered across enough turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentPolicy {
    min_categories: usize,
    min_user_turns: usize,
}

impl ContentPolicy {
    /// Creates the policy with explicit thresholds.
    #[inline]
    pub fn new(min_categories: usize, min_user_turns: usize) -> Self {
        Self {
            min_categories,
            min_user_turns,
        }
    }
}

impl Default for ContentPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(4, 3)
    }
}

impl CompletionPolicy for ContentPolicy {
    fn assess(&self, input: &PolicyInput<'_>) -> Assessment {
        let user_turns = input.conversation.user_turns().count();
        if user_turns < self.min_user_turns {
            return Assessment::default();
        }
        let text = input
            .conversation
            .user_turns()
            .map(|turn| turn.content())
            .collect::<Vec<_>>()
            .join("\n");
        let hits = category_hits(&text).len();
        trace!("{hits} categories covered in {user_turns} turns");
        Assessment {
            should_conclude: hits >= self.min_categories,
            ..Default::default()
        }
    }
}

/// Winds the survey down on a fixed schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationPolicy {
    final_question_at: Duration,
    conclude_at: Duration,
}

impl DurationPolicy {
    /// Creates the policy with explicit boundaries.
    #[inline]
    pub fn new(final_question_at: Duration, conclude_at: Duration) -> Self {
        Self {
            final_question_at,
            conclude_at,
        }
    }
}

impl Default for DurationPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_secs(50), Duration::from_secs(60))
    }
}

impl CompletionPolicy for DurationPolicy {
    fn assess(&self, input: &PolicyInput<'_>) -> Assessment {
        if input.elapsed >= self.conclude_at {
            Assessment {
                should_conclude: true,
                is_session_ending: true,
                force_ending: true,
            }
        } else if input.elapsed >= self.final_question_at {
            Assessment {
                is_session_ending: true,
                ..Default::default()
            }
        } else {
            Assessment::default()
        }
    }
}
