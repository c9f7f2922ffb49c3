use crate::model::{FortuneRequest, Phase};

/// Fixed fortune-teller persona sent with every generation.
pub const PERSONA: &str = "너는 '운명전쟁49' 프로그램에 등장하는 최고의 사주명리학자야. 사용자의 생년월일시를 바탕으로 성격, 재물운, 연애운, 올해의 주의할 점을 아주 신비롭고 단호한 어조로, 하지만 희망적인 메시지를 담아 3문단으로 풀이해줘.";

pub fn user_prompt(req: &FortuneRequest) -> String {
    [
        format!("사용자 이름: {}", req.name),
        format!("생년월일: {}", req.birth_date),
        format!("태어난 시간: {}", req.birth_time),
        String::new(),
        "위 정보를 바탕으로 사주를 풀이해줘.".to_string(),
    ]
    .join("\n")
}

/// The system instruction and prompt text to send for `phase`.
pub fn for_phase<'a>(persona: &'a str, user_prompt: &str, phase: Phase) -> (Option<&'a str>, String) {
    match phase {
        Phase::SystemInstruction => (Some(persona), user_prompt.to_string()),
        Phase::InlinePrompt => (None, format!("{persona}\n\n{user_prompt}")),
    }
}
