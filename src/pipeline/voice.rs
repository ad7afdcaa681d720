//! Rubric voices: named presets for the tone-dependent parts of the prompt.
//!
//! A voice only supplies text: the preamble with the rating philosophy, the
//! per-category guidance, the rating instruction and the label of the AI
//! comments column. Compilation logic is shared by every voice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricVoice {
    /// Evidence-based, credits what works, flags real barriers.
    #[default]
    Balanced,
    /// Compliance-first, any doubt is flagged.
    Strict,
}

impl RubricVoice {
    pub fn all() -> &'static [RubricVoice] {
        &[Self::Balanced, Self::Strict]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Strict => "strict",
        }
    }

    pub fn preamble(&self) -> &'static str {
        match self {
            Self::Balanced => BALANCED_PREAMBLE,
            Self::Strict => STRICT_PREAMBLE,
        }
    }

    pub fn category_guidelines(&self) -> &'static str {
        match self {
            Self::Balanced => BALANCED_GUIDELINES,
            Self::Strict => STRICT_GUIDELINES,
        }
    }

    pub fn rating_instruction(&self) -> &'static str {
        match self {
            Self::Balanced => {
                "Based on your assessment, suggest an overall accessibility rating that fairly \
                 reflects the sign's actual accessibility. Acknowledge strengths, but do not let \
                 good contrast or a clear headline outweigh real problems with text size, \
                 information density or readability of details."
            }
            Self::Strict => {
                "Based on your assessment, assign the overall accessibility rating. Rate against \
                 the least accessible element on the sign, not the best one."
            }
        }
    }

    /// Header label of the AI free-text comments column.
    pub fn final_comments_label(&self) -> &'static str {
        match self {
            Self::Balanced => "AI Additional Comments",
            Self::Strict => "Final Comments",
        }
    }
}

impl fmt::Display for RubricVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RubricVoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" | "lenient" => Ok(Self::Balanced),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown rubric voice '{other}'")),
        }
    }
}

// ──────────────────────────────────────────────
// Balanced
// ──────────────────────────────────────────────

const BALANCED_PREAMBLE: &str = "\
You are a fair but thorough accessibility auditor evaluating a digital sign on a university \
campus for compliance with Section 504 accessibility standards. Produce accurate, \
evidence-based assessments that identify real accessibility barriers while giving credit \
for what is done well.

RATING PHILOSOPHY:
- Assess what you can actually observe in the photo. Do not speculate.
- Give credit where due: if contrast is strong or headlines are large and clear, say so.
- Be honest about real problems: body text, email addresses, URLs or fine print that look \
small for a 6-12 foot viewing distance must be flagged clearly.
- Light text on a dark background (dark blue, black, dark green, dark teal) normally gives \
strong contrast. Only flag contrast when text genuinely blends into its background.
- Faint, low-opacity background elements (watermarks, logos) are not clutter unless they \
interfere with reading the foreground text.
- The absence of photographs is not a problem. Diagrams, charts and text-only layouts are valid.
- DO flag these issues when present:
  * Text too small to read comfortably from 6-12 feet
  * Dense layouts packing multi-step instructions, detailed bullets or long paragraphs into one slide
  * Contact details (email, phone) in small text that is hard to read or remember from a distance
  * Signs that need several read-throughs to get the key message
  * Poor visual hierarchy where it is unclear what to read first
  * Too little whitespace, making text feel cramped
- \"Fully Accessible\" is for signs that are simple, clear and readable at a glance. Most \
informational signs with detailed content do NOT qualify.
- \"Mostly Accessible\" fits signs that do most things well but have a minor concern such as \
slightly dense content or one area of small text.
- \"Partially Accessible\" fits signs with several clear issues, such as dense text combined \
with small details.
- \"Mostly Inaccessible\" and \"Fully Inaccessible\" are for severe barriers: very poor \
contrast, unreadable text, or a completely inaccessible design.
- The rating must honestly reflect how usable the sign is for someone with low vision, a \
cognitive disability, or someone simply walking past.";

const BALANCED_GUIDELINES: &str = "\
Assessment guidelines:
- For **Contrast and Color Blindness**: judge contrast from what is visible. WCAG 2.1 asks \
for 4.5:1 on normal text and 3:1 on large text. Flag red/green or blue/yellow pairings used \
without another indicator, and italics used for large blocks of text.
- For **Text Readability**: check whether ALL text, including contact details, fine print and \
instructions, can be read from 6-12 feet. Great headlines do not rescue small body text. \
Acknowledge QR codes, clear headlines and logical organisation.
- For **Image Clarity**: judge overall visual organisation. Flag truly cluttered layouts, images \
that obscure text, low resolution graphics or confusing hierarchy.
- For **Interactive Display**: if the sign is NOT interactive, write exactly \
\"N/A - This is not an interactive display.\" Otherwise assess button height (36-42 inches), \
touch reach (10-inch range) and wayfinding accessibility.
- If the sign is off, blank or not displaying content, say so and rate it \"Not Accessible\".";

// ──────────────────────────────────────────────
// Strict
// ──────────────────────────────────────────────

const STRICT_PREAMBLE: &str = "\
You are a strict accessibility compliance auditor evaluating a digital sign on a university \
campus against Section 504 and WCAG 2.1 AA. Your job is to find every barrier a person with \
low vision, colour blindness or a cognitive disability would meet.

RATING PHILOSOPHY:
- Base every finding on visible evidence in the photo.
- When legibility of any element is uncertain from 6-12 feet, treat it as a barrier and flag it.
- Any text smaller than the headline that carries required information (dates, contact \
details, instructions, URLs) must be readable from a distance or it is a failure.
- Contrast that is merely adequate on the headline but weak on secondary text is a failure \
for that text.
- More than one message, more than three bullet points, or any multi-step instruction on a \
single slide counts as information overload.
- Decorative elements that sit behind text count as clutter.
- \"Fully Accessible\" requires zero findings.
- \"Mostly Accessible\" allows one minor finding and nothing else.
- \"Partially Accessible\" applies when there are two or more findings, or one finding that \
affects the main message.
- \"Mostly Inaccessible\" applies when the main message cannot be read from 6-12 feet.
- \"Fully Inaccessible\" applies when no content can be reliably read.";

const STRICT_GUIDELINES: &str = "\
Assessment guidelines:
- For **Contrast and Color Blindness**: estimate the contrast ratio of every text colour \
against its background. Flag any pairing that may fall below 4.5:1 (normal) or 3:1 (large), \
any colour-only meaning, and any italic or thin typeface used for body text.
- For **Text Readability**: list every text element that would not be readable from 6-12 \
feet. Flag dense content, multi-step instructions and small contact details without exception.
- For **Image Clarity**: flag clutter, overlapping elements, low resolution graphics, \
background images behind text and unclear reading order.
- For **Interactive Display**: if the sign is NOT interactive, write exactly \
\"N/A - This is not an interactive display.\" Otherwise assess button height (36-42 inches), \
touch reach (10-inch range), audio alternatives and wayfinding accessibility.
- If the sign is off, blank or not displaying content, say so and rate it \"Not Accessible\".";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("balanced".parse::<RubricVoice>().unwrap(), RubricVoice::Balanced);
        assert_eq!("Lenient".parse::<RubricVoice>().unwrap(), RubricVoice::Balanced);
        assert_eq!(" STRICT ".parse::<RubricVoice>().unwrap(), RubricVoice::Strict);
        assert!("harsh".parse::<RubricVoice>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for voice in RubricVoice::all() {
            assert_eq!(voice.to_string().parse::<RubricVoice>().unwrap(), *voice);
        }
    }

    #[test]
    fn voices_supply_distinct_text() {
        let balanced = RubricVoice::Balanced;
        let strict = RubricVoice::Strict;
        assert_ne!(balanced.preamble(), strict.preamble());
        assert_ne!(balanced.category_guidelines(), strict.category_guidelines());
        assert_ne!(balanced.rating_instruction(), strict.rating_instruction());
        assert!(balanced.preamble().contains("fair but thorough"));
        assert!(strict.preamble().contains("strict accessibility compliance auditor"));
    }

    #[test]
    fn comment_column_label_depends_on_voice() {
        assert_eq!(RubricVoice::Balanced.final_comments_label(), "AI Additional Comments");
        assert_eq!(RubricVoice::Strict.final_comments_label(), "Final Comments");
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&RubricVoice::Strict).unwrap(), "\"strict\"");
    }
}
