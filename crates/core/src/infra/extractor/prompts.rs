/// 検索意図抽出プロンプトテンプレート

/// 書き起こしを埋め込む位置
const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

pub const INTENT_PROMPT_TEMPLATE: &str = "\
You extract equipment rental search filters for an agricultural marketplace.
Read the farmer's spoken request below and reply with ONLY a JSON object, no prose and no code fences.
Use exactly these keys and set a key to null when the request does not mention it:
- \"equipment_type\": the kind of equipment (string or null)
- \"location\": the place the farmer wants it (string or null)
- \"duration\": the number of rental days (integer or null)
- \"budget\": the maximum price the farmer will pay (number or null)
- \"features\": required features (array of strings or null)

Example request: \"I want a tractor with GPS in Pune for 5 days under 3000 rupees\"
Example reply: {\"equipment_type\":\"tractor\",\"location\":\"Pune\",\"duration\":5,\"budget\":3000,\"features\":[\"GPS\"]}

Request: \"{transcript}\"";

/// 書き起こしをそのまま埋め込んだプロンプトを構築する
pub fn build_intent_prompt(transcript: &str) -> String {
    INTENT_PROMPT_TEMPLATE.replacen(TRANSCRIPT_PLACEHOLDER, transcript, 1)
}
