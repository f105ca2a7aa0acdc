use crate::ai_agent::data::models::{truncate_chars, AnalysisRequest};

pub const SYSTEM_PROMPT: &str = r#"You are a strategic analyst for utility-scale renewable energy projects, with particular experience of islands and emerging markets.
Give precise, decision-ready output. Where data is missing, make realistic assumptions and label them as assumptions.
Write concise professional English and follow the requested JSON schema exactly."#;

pub const ADVISOR_SYSTEM_PROMPT: &str = r#"You are an advisor for renewable energy project teams, acting as a concise senior consultant.
Answer with short, specific, actionable guidance. If a fact is unknown, say so and suggest how to find it."#;

const SCHEMA: &str = r#"{
  "executive_summary": "string",
  "pestel": [{"factor": "Political", "points": ["..."], "assessment": "..."}],
  "swot": {"strengths": ["..."], "weaknesses": ["..."], "opportunities": ["..."], "threats": ["..."]},
  "risks": [{"category": "Regulatory", "risk": "...", "probability": 1-5, "impact": 1-5, "mitigation": "..."}],
  "legal_fiscal": "string (permits, licensing, VAT/duty/corporate tax, RE incentives, PPA norms)",
  "logistics": "string (ports, customs, road constraints, storage, weather windows)",
  "recommendations": ["..."]
}"#;

fn attachments_block(request: &AnalysisRequest, prefix_chars: usize) -> String {
  let mut block = String::new();
  for (name, content) in &request.attachments {
    block.push_str(&format!("\n\n### Attachment: {}\n{}", name, truncate_chars(content, prefix_chars)));
  }
  block
}

pub fn build_user_prompt(request: &AnalysisRequest, prefix_chars: usize) -> String {
  format!(r#"Produce a strategic analysis of the project below. Reply with ONLY a JSON object following this schema:
{schema}

Project:
- Country: {country}
- Technology: {technology}
- Capacity (MW): {capacity}
- Client: {client}
- Offtaker: {offtaker}
- Horizon: {horizon}

Notes from the user:
{notes}

Attachments (raw excerpts, if any):
{attachments}

Requirements:
- Be specific to the country and technology wherever possible.
- PESTEL: 3-5 points per factor plus a short assessment.
- SWOT: 4-6 points per quadrant.
- Risks: 8-12 items covering Regulatory, Technical, Financial, Fiscal, Environmental, Logistic and Social/Stakeholder.
- Rate probability and impact as integers from 1 to 5.
- legal_fiscal: permits and licensing, typical VAT and import duty, common RE incentives where they apply.
- logistics: port clearance times, likely HS-code pitfalls, route surveys, seasonal constraints.
- Close with 6-10 recommendations that can be acted on this month.
"#,
    schema = SCHEMA,
    country = request.country,
    technology = request.technology,
    capacity = request.capacity_mw,
    client = request.client,
    offtaker = request.offtaker,
    horizon = request.horizon,
    notes = request.notes,
    attachments = attachments_block(request, prefix_chars))
}

pub fn build_advisor_prompt(question: &str, context: &str) -> String {
  format!("Context:\n{}\n\nQuestion:\n{}", context, question)
}
