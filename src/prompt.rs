//! Deterministic prompt construction for question generation.

/// System and user instruction pair sent to the completion gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    /// Role framing for the model.
    pub system: String,
    /// Chunk-specific generation instructions.
    pub user: String,
}

const SYSTEM_PROMPT: &str = "You are an expert educational content creator specializing in \
generating high-quality assessment questions from text content. Your task is to analyze the \
given text and create clear, accurate, and pedagogically sound questions.";

/// Render the generation instructions for one chunk of source text.
///
/// Pure function of its inputs: the same chunk and count always produce the
/// same payload. The template demands a bare JSON object with a single
/// top-level `questions` array so the normalizer has a fighting chance.
pub fn build_generation_prompt(chunk_text: &str, desired_count: usize) -> PromptPayload {
    let user = format!(
        r#"Based on the following text, generate {desired_count} educational questions.

TEXT:
{chunk_text}

REQUIREMENTS:
1. Generate exactly {desired_count} questions
2. Create a mix of question types: multiple_choice, fill_in_blank, and true_false
3. Each question should test understanding of key concepts from the text
4. Questions should be clear, unambiguous, and grammatically correct
5. For multiple_choice: provide 4 options (A, B, C, D) and set correct_answer to exactly one option label
6. For true_false: correct_answer must be "True" or "False"
7. Include a detailed explanation for each answer
8. Assign a difficulty level for each question: easy, medium, or hard
9. Identify the topic/subject for each question

OUTPUT FORMAT:
Return ONLY a valid JSON object in this exact structure (no additional text):
{{
  "questions": [
    {{
      "type": "multiple_choice",
      "prompt_text": "Question text here?",
      "options": [
        {{"label": "A", "text": "First option"}},
        {{"label": "B", "text": "Second option"}},
        {{"label": "C", "text": "Third option"}},
        {{"label": "D", "text": "Fourth option"}}
      ],
      "correct_answer": "B",
      "explanation": "Detailed explanation of why B is correct",
      "difficulty": "medium",
      "topic": "Topic name"
    }},
    {{
      "type": "fill_in_blank",
      "prompt_text": "The capital of France is _______.",
      "correct_answer": "Paris",
      "explanation": "Paris is the capital city of France",
      "difficulty": "easy",
      "topic": "Geography"
    }},
    {{
      "type": "true_false",
      "prompt_text": "The Earth is flat.",
      "correct_answer": "False",
      "explanation": "The Earth is an oblate spheroid",
      "difficulty": "easy",
      "topic": "Science"
    }}
  ]
}}

Remember: Return ONLY the JSON object, no markdown formatting, no code fences, no additional text."#
    );

    PromptPayload {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
