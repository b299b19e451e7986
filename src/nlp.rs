use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use lindera::dictionary::load_dictionary;
use lindera::mode::Mode;
use lindera::segmenter::Segmenter;
use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Hangul}+|[A-Za-z]+(?:['-][A-Za-z]+)*|\d+(?:[.,]\d+)*|\p{Han}+|[^\s\p{Hangul}\p{Han}A-Za-z\d]+")
        .unwrap()
});

const MAX_INPUT_CHARS: usize = 10_000;

/// Final consonant the stem must (or must not) end in for a particle to attach.
#[derive(Debug, Clone, Copy)]
enum Coda {
    Any,
    Consonant,
    Vowel,
}

// (particle, coda of the stem, min stem syllables). Longest first.
const PARTICLES: &[(&str, Coda, usize)] = &[
    ("입니다", Coda::Any, 1),
    ("이에요", Coda::Consonant, 1),
    ("예요", Coda::Vowel, 1),
    ("에서", Coda::Any, 1),
    ("으로", Coda::Consonant, 1),
    ("에게", Coda::Any, 1),
    ("까지", Coda::Any, 1),
    ("부터", Coda::Any, 1),
    ("처럼", Coda::Any, 1),
    ("을", Coda::Consonant, 1),
    ("를", Coda::Vowel, 1),
    ("은", Coda::Consonant, 1),
    ("는", Coda::Vowel, 2),
    ("가", Coda::Vowel, 2),
    ("와", Coda::Vowel, 2),
    ("과", Coda::Consonant, 2),
];

// Endings of 하- derived predicates; the stem before them is a root (따뜻한 → 따뜻).
const HA_ENDINGS: &[&str] = &["합니다", "하고", "하게", "해서", "하며", "하다", "해요", "하는", "한"];
const MIN_ROOT_SYLLABLES: usize = 2;

// Inflected endings that mark the whole word as a verb or adjective.
const PREDICATE_ENDINGS: &[&str] = &["습니다", "니다", "어요", "아요", "여요", "세요", "쁜"];
// Adnominal ㅂ-irregular ending (가벼운, 귀여운); short words like 가운 are nouns.
const IRREGULAR_ADNOMINAL: &str = "운";
const MIN_IRREGULAR_LEN: usize = 3;
// Verbal adnominal after a consonant-final stem (입는, 신는).
const VERBAL_ADNOMINAL: &str = "는";

/// Part-of-speech tags the rest of the crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosTag {
    CommonNoun,
    ProperNoun,
    ForeignScript,
    Root,
    Number,
    Symbol,
    Particle,
    Predicate,
    Ending,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub form: String,
    pub tag: PosTag,
}

impl Token {
    fn new(form: &str, tag: PosTag) -> Self {
        Token { form: form.to_string(), tag }
    }

    pub fn char_len(&self) -> usize {
        self.form.chars().count()
    }
}

/// Morphological analyzer seam. Implementations must be read-only after
/// construction so a single handle can be shared across threads.
pub trait Analyzer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;
}

fn check_len(text: &str) -> Result<()> {
    let n = text.chars().count();
    if n > MAX_INPUT_CHARS {
        bail!("analyzer input too long: {} chars (max {})", n, MAX_INPUT_CHARS);
    }
    Ok(())
}

// ── Dictionary analyzer ──

/// ko-dic backed analyzer. `uri` is anything lindera's `load_dictionary`
/// accepts: a compiled dictionary directory, `file://...`, or
/// `embedded://ko-dic` when built with the `embed-ko-dic` feature.
pub struct DictionaryAnalyzer {
    segmenter: Segmenter,
}

impl DictionaryAnalyzer {
    pub fn load(uri: &str) -> Result<Self> {
        let dictionary =
            load_dictionary(uri).with_context(|| format!("Failed to load dictionary {}", uri))?;
        Ok(DictionaryAnalyzer {
            segmenter: Segmenter::new(Mode::Normal, dictionary, None),
        })
    }
}

impl Analyzer for DictionaryAnalyzer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        check_len(text)?;
        let mut segments = self
            .segmenter
            .segment(Cow::Borrowed(text))
            .context("Segmentation failed")?;

        let mut tokens = Vec::with_capacity(segments.len());
        for seg in segments.iter_mut() {
            let tag = seg.get_detail(0).map(ko_dic_tag).unwrap_or(PosTag::Other);
            tokens.push(Token::new(&seg.surface, tag));
        }
        Ok(tokens)
    }
}

/// Map a ko-dic (Sejong) tag onto `PosTag`. Compound inflection tags such
/// as `VA+ETM` take the class of their head; a compound never counts as
/// a noun.
fn ko_dic_tag(pos: &str) -> PosTag {
    match pos {
        "NNG" => return PosTag::CommonNoun,
        "NNP" => return PosTag::ProperNoun,
        "SL" => return PosTag::ForeignScript,
        "XR" => return PosTag::Root,
        "SN" => return PosTag::Number,
        _ => {}
    }
    let head = pos.split('+').next().unwrap_or(pos);
    if head.starts_with('J') {
        PosTag::Particle
    } else if head.starts_with('V') {
        PosTag::Predicate
    } else if head.starts_with('E') || head.starts_with("XS") {
        PosTag::Ending
    } else if head.starts_with('S') {
        PosTag::Symbol
    } else {
        PosTag::Other
    }
}

// ── Rule-based analyzer ──

/// Dictionary-free analyzer. Text is split into script runs: Latin runs
/// are foreign script and digits are numbers. Each Hangul word goes
/// through closed-class suffix rules: a particle that agrees with the
/// stem's final consonant is split off (코트를 → 코트 + 를), a 하- derived
/// predicate yields its root (따뜻하고 → 따뜻 + 하고), and other inflected
/// endings mark the word as a predicate (입어요, 예쁜). Whatever is left
/// is a common noun. Entries in the proper-noun lexicon are tagged as
/// proper nouns whatever their script.
#[derive(Debug, Default)]
pub struct ScriptAnalyzer {
    proper_nouns: HashSet<String>,
}

impl ScriptAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proper_nouns<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proper_nouns.extend(words.into_iter().map(Into::into));
        self
    }

    fn classify(&self, run: &str, out: &mut Vec<Token>) {
        if self.proper_nouns.contains(run) {
            out.push(Token::new(run, PosTag::ProperNoun));
            return;
        }

        let first = match run.chars().next() {
            Some(c) => c,
            None => return,
        };

        if is_hangul(first) {
            self.classify_hangul(run, out);
        } else if first.is_ascii_alphabetic() {
            out.push(Token::new(run, PosTag::ForeignScript));
        } else if first.is_ascii_digit() {
            out.push(Token::new(run, PosTag::Number));
        } else if first.is_alphabetic() {
            out.push(Token::new(run, PosTag::Other));
        } else {
            out.push(Token::new(run, PosTag::Symbol));
        }
    }

    fn classify_hangul(&self, word: &str, out: &mut Vec<Token>) {
        for ending in HA_ENDINGS {
            if let Some(stem) = word.strip_suffix(ending) {
                if stem.chars().count() >= MIN_ROOT_SYLLABLES {
                    out.push(Token::new(stem, PosTag::Root));
                    out.push(Token::new(ending, PosTag::Ending));
                    return;
                }
            }
        }

        if is_predicate(word) {
            out.push(Token::new(word, PosTag::Predicate));
            return;
        }

        for (particle, coda, min_stem) in PARTICLES {
            let Some(stem) = word.strip_suffix(particle) else {
                continue;
            };
            if stem.chars().count() >= *min_stem && coda_matches(stem, *coda) {
                let tag = if self.proper_nouns.contains(stem) {
                    PosTag::ProperNoun
                } else {
                    PosTag::CommonNoun
                };
                out.push(Token::new(stem, tag));
                out.push(Token::new(particle, PosTag::Particle));
                return;
            }
        }

        out.push(Token::new(word, PosTag::CommonNoun));
    }
}

impl Analyzer for ScriptAnalyzer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        check_len(text)?;
        let mut tokens = Vec::new();
        for m in TOKEN_RE.find_iter(text) {
            self.classify(m.as_str(), &mut tokens);
        }
        Ok(tokens)
    }
}

fn is_predicate(word: &str) -> bool {
    if PREDICATE_ENDINGS
        .iter()
        .any(|e| word.len() > e.len() && word.ends_with(e))
    {
        return true;
    }
    if word.ends_with(IRREGULAR_ADNOMINAL) && word.chars().count() >= MIN_IRREGULAR_LEN {
        return true;
    }
    word.strip_suffix(VERBAL_ADNOMINAL)
        .is_some_and(|stem| coda_matches(stem, Coda::Consonant))
}

fn coda_matches(stem: &str, coda: Coda) -> bool {
    let Some(last) = stem.chars().last() else {
        return false;
    };
    match coda {
        Coda::Any => true,
        Coda::Consonant => has_final_consonant(last),
        Coda::Vowel => is_hangul_syllable(last) && !has_final_consonant(last),
    }
}

fn is_hangul_syllable(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}')
}

/// True when a precomposed syllable carries a final consonant (batchim).
fn has_final_consonant(c: char) -> bool {
    is_hangul_syllable(c) && (c as u32 - 0xAC00) % 28 != 0
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}
