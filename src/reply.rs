//! Canned replies to a review, by sentiment, locale and tone.

use std::fmt;
use std::str::FromStr;

use crate::text::detect_language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// Star rating to label: 1-2 negative, 3 neutral, 4-5 positive.
    pub fn from_stars(stars: u8) -> Self {
        match stars {
            0..=2 => Self::Negative,
            3 => Self::Neutral,
            _ => Self::Positive,
        }
    }

    /// Lenient label parsing; anything unknown reads as neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" | "positif" => Self::Positive,
            "negative" | "négatif" | "negatif" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Formal,
    Friendly,
    Empathetic,
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" | "formel" => Ok(Self::Formal),
            "friendly" | "amical" => Ok(Self::Friendly),
            "empathetic" | "empathique" => Ok(Self::Empathetic),
            other => Err(format!(
                "unknown tone '{}' (expected formal, friendly or empathetic)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Fr,
    En,
}

impl Locale {
    /// `fr-FR` -> fr, `en_US` -> en, anything else -> fr.
    pub fn normalize(code: &str) -> Self {
        let code = code.trim().to_lowercase();
        if code.starts_with("en") {
            Self::En
        } else {
            Self::Fr
        }
    }

    /// An explicit code wins; otherwise the review's own language, then fr.
    pub fn resolve(explicit: Option<&str>, review_text: &str) -> Self {
        match explicit {
            Some(code) => Self::normalize(code),
            None => detect_language(review_text)
                .map(|code| Self::normalize(&code))
                .unwrap_or(Self::Fr),
        }
    }
}

pub fn render_reply(
    _review_text: &str,
    sentiment: Sentiment,
    locale: Locale,
    brand: Option<&str>,
    platform: Option<&str>,
    tone: Tone,
) -> String {
    let platform = platform.unwrap_or("");
    let (opening, core, closing) = match locale {
        Locale::Fr => {
            let brand = brand.unwrap_or("notre enseigne");
            (fr_opening(tone), fr_core(sentiment, tone, brand, platform), fr_closing(tone))
        }
        Locale::En => {
            let brand = brand.unwrap_or("our store");
            (en_opening(tone), en_core(sentiment, tone, brand, platform), EN_CLOSING)
        }
    };
    format!("{}\n\n{}{}", opening, core, closing)
}

fn fr_opening(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => "Bonjour,",
        Tone::Friendly => "Bonjour 😊",
        Tone::Empathetic => "Bonjour 🙏",
    }
}

fn fr_closing(tone: Tone) -> &'static str {
    match tone {
        Tone::Friendly => "\n\nÀ bientôt,\nL'équipe Service Client",
        Tone::Formal | Tone::Empathetic => "\n\nCordialement,\nL'équipe Service Client",
    }
}

fn fr_core(sentiment: Sentiment, tone: Tone, brand: &str, platform: &str) -> String {
    match (sentiment, tone) {
        (Sentiment::Positive, Tone::Formal) => format!(
            "Merci pour votre avis positif sur {brand} et pour votre confiance.\n\
             Nous sommes ravis de voir que votre expérience sur {platform} s'est bien passée."
        ),
        (Sentiment::Positive, Tone::Friendly) => format!(
            "Un grand merci pour votre super retour sur {brand} 🥰\n\
             Ça nous fait vraiment plaisir de savoir que votre expérience s'est bien passée via {platform}."
        ),
        (Sentiment::Positive, Tone::Empathetic) => format!(
            "Merci du fond du cœur pour votre message sur {brand} ❤️\n\
             Nous sommes très heureux d'avoir pu vous offrir une belle expérience, \
             et votre retour sur {platform} compte beaucoup pour nous."
        ),
        (Sentiment::Negative, Tone::Formal) => format!(
            "Nous sommes désolés d'apprendre que votre expérience avec {brand} via {platform} \
             n'a pas été à la hauteur de vos attentes.\n\
             Merci d'avoir pris le temps de nous faire part de ces éléments ; \
             nous allons analyser la situation afin de nous améliorer."
        ),
        (Sentiment::Negative, Tone::Friendly) => format!(
            "Merci d'avoir pris le temps de nous laisser un avis sur {brand}, même si l'expérience \
             n'était pas au rendez-vous 😔\n\
             On aimerait vraiment comprendre ce qui s'est passé pour pouvoir améliorer les choses."
        ),
        (Sentiment::Negative, Tone::Empathetic) => format!(
            "Nous sommes vraiment navrés de lire que votre expérience avec {brand} via {platform} \
             ne s'est pas bien déroulée 😔\n\
             Votre ressenti est important pour nous et nous vous remercions sincèrement de l'avoir partagé.\n\
             Si vous le souhaitez, vous pouvez nous contacter directement afin que nous trouvions une solution ensemble."
        ),
        (Sentiment::Neutral, Tone::Formal) => format!(
            "Merci pour votre retour au sujet de {brand}.\n\
             Vos remarques nous aident à mieux comprendre vos attentes et à faire évoluer notre service."
        ),
        (Sentiment::Neutral, Tone::Friendly) => format!(
            "Merci pour votre avis sur {brand} 😊\n\
             On note vos retours et on va faire en sorte de continuer à s'améliorer."
        ),
        (Sentiment::Neutral, Tone::Empathetic) => format!(
            "Merci d'avoir partagé votre expérience avec {brand}.\n\
             Nous prenons vos remarques avec beaucoup d'attention afin d'améliorer nos services."
        ),
    }
}

fn en_opening(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => "Hello,",
        Tone::Friendly => "Hi there 😊",
        Tone::Empathetic => "Hello 🙏",
    }
}

const EN_CLOSING: &str = "\n\nBest regards,\nThe Customer Service Team";

fn en_core(sentiment: Sentiment, tone: Tone, brand: &str, platform: &str) -> String {
    match (sentiment, tone) {
        (Sentiment::Positive, Tone::Formal) => format!(
            "Thank you for your positive feedback about {brand}.\n\
             We're glad to hear your experience on {platform} went well."
        ),
        (Sentiment::Positive, Tone::Friendly) => format!(
            "Thank you so much for the great review about {brand} 🥰\n\
             We're really happy that you enjoyed your experience via {platform}."
        ),
        (Sentiment::Positive, Tone::Empathetic) => format!(
            "Thank you from the bottom of our hearts for your kind words about {brand} ❤️\n\
             Knowing that your experience via {platform} went well truly means a lot to us."
        ),
        (Sentiment::Negative, Tone::Formal) => format!(
            "We're sorry to hear that your experience with {brand} through {platform} \
             did not meet your expectations.\n\
             Thank you for taking the time to share this with us; we will review the situation carefully."
        ),
        (Sentiment::Negative, Tone::Friendly) => format!(
            "Thanks for sharing your feedback about {brand}, even though things didn't go as expected 😔\n\
             We'd really like to understand what happened so we can improve."
        ),
        (Sentiment::Negative, Tone::Empathetic) => format!(
            "We're truly sorry to read that your experience with {brand} via {platform} \
             was disappointing 😔\n\
             Your feelings matter to us, and we really appreciate you taking the time to explain the situation.\n\
             If you'd like, feel free to contact us directly so we can try to sort this out together."
        ),
        (Sentiment::Neutral, Tone::Formal) => format!(
            "Thank you for your feedback about {brand}.\n\
             Your comments help us better understand your expectations and improve our service."
        ),
        (Sentiment::Neutral, Tone::Friendly) => format!(
            "Thanks for your review about {brand} 😊\n\
             We appreciate your feedback and will use it to keep improving."
        ),
        (Sentiment::Neutral, Tone::Empathetic) => format!(
            "Thank you for taking the time to share your experience with {brand}.\n\
             We carefully consider this type of feedback to improve our services."
        ),
    }
}
