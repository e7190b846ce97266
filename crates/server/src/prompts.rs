//! Instructions sent to the language model.

use survey_chat_model::{ChatMessage, ChatRequest, SessionContext};

/// Token limit of a survey reply.
pub const CHAT_MAX_TOKENS: u32 = 1024;

/// Token limit of a suggestion reply. The answer is a short JSON object.
pub const SUGGESTIONS_MAX_TOKENS: u32 = 200;

/// Persona and rules of the interviewer.
pub const SURVEY_SYSTEM_PROMPT: &str = r#"You are a friendly interviewer asking about startup workflows and tools.

Start with: "Hey! Quick interview about startup workflows - what's your role, team size, and are you remote/office?"

Target these columns by asking compound questions:
- role, team_size, location_setup, company_stage, industry_sector
- project_management_tools, documentation_tools, communication_tools
- ai_usage, meeting_practices
- main_pain_points, tool_satisfaction, looking_to_change

Rules:
- Keep responses under 25 words
- Ask compound questions to get multiple data points
- No commentary or reactions
- Brief acknowledgment then next compound question
- NEVER assume information not explicitly provided by the user
- Only reference details the user has actually shared
- Stay focused on startup workflows and tools only
- Politely redirect if user goes off-topic (politics, religion, gossip, etc.)

When you have most columns filled, ask the final question: "Final question - what value are you currently getting out of AI?"

End after the AI value response: "Perfect, thanks for taking the time! 🙏""#;

/// Appended when the survey should end with this reply.
pub const CONCLUDE_ADDENDUM: &str = "\n\nIMPORTANT: You have enough information. End with exactly \"Perfect, thanks!\" and nothing more.";

/// Appended when the session is about to run out of time.
pub const FINAL_QUESTION_ADDENDUM: &str = "\n\nIMPORTANT: Time is almost up. Ask only the final question: \"Final question - what value are you currently getting out of AI?\"";

/// Instructions of the suggestion generator.
pub const SUGGESTIONS_SYSTEM_PROMPT: &str = r#"You are generating answer suggestion buttons for a startup survey.

Given a survey question, provide 1-2 word ANSWER options that startups would commonly give to that specific question. These are NOT conversation responses or pleasantries - they are direct answers to the question asked.

Examples:
- Question: "What's your team size?" → Answers: ["2-5", "6-10", "11-25", "26-50", "50+"]
- Question: "What tools do you use?" → Answers: ["Slack", "Notion", "Jira", "Linear"]
- Question: "What are your pain points?" → Answers: ["Communication", "Too many tools", "Context switching", "Manual work"]

If the question asks multiple things, group the suggestions by topic.

Return your response as a JSON object with this structure:
{
  "groups": [
    {
      "category": "Tools",
      "suggestions": ["Slack", "Notion", "Jira", "Linear"]
    }
  ]
}

Guidelines:
- Generate ANSWER suggestions, not conversation responses
- Keep suggestions to 1-2 words max
- Maximum 6 suggestions per group
- Focus on common startup/tech answers
- Never suggest pleasantries like "Thanks", "Hi there", "Pleased to meet"
- Always provide concrete, actionable answer options"#;

/// Builds the system prompt for one survey reply.
///
/// A request to conclude wins over a request for the final question.
pub fn survey_system_prompt(context: &SessionContext) -> String {
    let mut prompt = SURVEY_SYSTEM_PROMPT.to_owned();
    if context.should_conclude {
        prompt.push_str(CONCLUDE_ADDENDUM);
    } else if context.is_session_ending {
        prompt.push_str(FINAL_QUESTION_ADDENDUM);
    }
    prompt
}

/// Builds the upstream request of a survey reply.
pub fn survey_request(messages: Vec<ChatMessage>, context: SessionContext) -> ChatRequest {
    ChatRequest {
        system: Some(survey_system_prompt(&context)),
        messages,
        context,
        max_tokens: Some(CHAT_MAX_TOKENS),
    }
}

/// Builds the upstream request asking for answer options to `question`.
pub fn suggestions_request(question: &str) -> ChatRequest {
    let content = format!(
        "Question: \"{question}\"\n\nGenerate appropriate suggestion buttons for this question."
    );
    ChatRequest {
        system: Some(SUGGESTIONS_SYSTEM_PROMPT.to_owned()),
        messages: vec![ChatMessage::user(content)],
        max_tokens: Some(SUGGESTIONS_MAX_TOKENS),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addenda() {
        let plain = survey_system_prompt(&SessionContext::default());
        assert_eq!(plain, SURVEY_SYSTEM_PROMPT);

        let ending = survey_system_prompt(&SessionContext {
            is_session_ending: true,
            ..Default::default()
        });
        assert!(ending.ends_with(FINAL_QUESTION_ADDENDUM));

        let conclude = survey_system_prompt(&SessionContext {
            is_session_ending: true,
            should_conclude: true,
            ..Default::default()
        });
        assert!(conclude.ends_with(CONCLUDE_ADDENDUM));
        assert!(!conclude.contains(FINAL_QUESTION_ADDENDUM));
    }

    #[test]
    fn test_suggestions_request() {
        let req = suggestions_request("What's your team size?");
        assert_eq!(req.max_tokens, Some(SUGGESTIONS_MAX_TOKENS));
        assert_eq!(
            req.messages[0].content,
            "Question: \"What's your team size?\"\n\nGenerate appropriate suggestion buttons for this question."
        );
    }
}
