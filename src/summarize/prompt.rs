// Prompt assembly for summarization.
//
// Speaker ids follow the channel convention of multichannel diarization:
// channel 1 is the local microphone (the host), channel 2 is system
// audio (everyone else on the call).

use crate::transcribe::Transcript;

pub const SYSTEM_PROMPT: &str = r#"You are an expert meeting and call summarizer. Analyze the transcript you are given and produce a structured, actionable summary.

Work through these steps in order:

STEP 1 - UNDERSTAND THE CONTEXT
Read the whole transcript first and work out:
- What kind of conversation this is (meeting, phone call, interview, presentation, ...)
- Its main topic or purpose
- Who the participants are, from dialogue patterns and any names mentioned
- How the participants relate to each other (colleagues, client and vendor, interviewer and candidate, ...)

STEP 2 - IDENTIFY KEY INFORMATION
Then extract:
- The main discussion points and any decisions made
- Action items or tasks assigned, with owners where mentioned
- Deadlines, dates, or commitments
- Key insights, conclusions, or outcomes
- Unresolved issues or questions needing follow-up

STEP 3 - SYNTHESIZE A SUMMARY
Finally, write a clear Markdown summary that captures the essence of the conversation, uses proper Markdown structure (## headers, - bullets, **bold** for emphasis), stays professional and neutral in tone, and puts decisions, outcomes, and next steps first.

Your response MUST be valid JSON matching this exact structure:
{
  "context": "A 1-2 sentence description of what this conversation is about and its purpose",
  "participants": ["Person 1 or Role 1", "Person 2 or Role 2"],
  "keyPoints": ["Key point 1", "Key point 2", "Key point 3"],
  "actionItems": ["Action item 1", "Action item 2"],
  "summaryMarkdown": "A Markdown-formatted summary with headings, bullet points, and paragraphs."
}

Notes:
- If participant names are unclear, use descriptive roles such as "Host", "Participant", "Interviewer", "Caller"
- If there are no clear action items, return an empty array for actionItems
- Keep keyPoints concise: 3-7 bullets
- The summary should cover what someone who missed the call needs to know, without padding"#;

/// Map a diarized speaker id to a label the model can reason about
pub fn speaker_label(speaker_id: &str) -> String {
    if speaker_id.starts_with('1') {
        return if speaker_id == "1A" {
            "You (Host)".to_string()
        } else {
            format!("Speaker {speaker_id}")
        };
    }
    match speaker_id.strip_prefix('2') {
        Some(letter) if !letter.is_empty() => format!("Participant {letter}"),
        // Single-channel diarization hands out bare letters; keep them
        // distinguishable instead of guessing a channel.
        _ => format!("Speaker {speaker_id}"),
    }
}

/// Render utterances as labelled dialogue, falling back to the flat text
/// when the provider produced no utterances
pub fn format_transcript(transcript: &Transcript) -> String {
    if transcript.utterances.is_empty() {
        return transcript.text.clone();
    }
    transcript
        .utterances
        .iter()
        .map(|u| format!("[{}]: {}", speaker_label(&u.speaker_id), u.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_prompt(transcript: &Transcript) -> String {
    let duration_minutes = (transcript.duration_seconds / 60.0).round() as i64;
    let plural = if duration_minutes == 1 { "" } else { "s" };
    let speakers_line = if transcript.utterances.is_empty() {
        String::new()
    } else {
        format!("Speakers detected: {}\n", transcript.speaker_count())
    };

    format!(
        "Here is the transcript to summarize:\n\n---\nDuration: {duration_minutes} minute{plural}\n{speakers_line}\n{}\n---\n\nRemember to follow the 3 steps: (1) understand the context, (2) identify key information, (3) synthesize the summary. Return only valid JSON.",
        format_transcript(transcript)
    )
}
