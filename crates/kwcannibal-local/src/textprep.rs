//! Tokenization for the similarity engine.
//!
//! Lowercased runs of two or more word characters (alphanumeric or `_`), with English stop words
//! removed. No stemming, no language detection.

use std::collections::HashSet;
use std::sync::OnceLock;

pub mod stopwords {
    /// Common low-information English words dropped before vectorization.
    pub const ENGLISH: &[&str] = &[
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg", "eight",
        "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even", "ever",
        "every", "everyone", "everything", "everywhere", "except", "few", "fifteen", "fifty",
        "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found",
        "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt",
        "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon",
        "hers", "herself", "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if",
        "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself", "keep", "last",
        "latter", "latterly", "least", "less", "ltd", "made", "many", "may", "me", "meanwhile",
        "might", "mill", "mine", "more", "moreover", "most", "mostly", "move", "much", "must",
        "my", "myself", "name", "namely", "neither", "never", "nevertheless", "next", "nine",
        "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off",
        "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise",
        "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please",
        "put", "rather", "re", "same", "see", "seem", "seemed", "seeming", "seems", "serious",
        "several", "she", "should", "show", "side", "since", "sincere", "six", "sixty", "so",
        "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
        "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them",
        "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
        "therein", "thereupon", "these", "they", "thick", "thin", "third", "this", "those",
        "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
        "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
        "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
        "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein",
        "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever",
        "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
        "you", "your", "yours", "yourself", "yourselves",
    ];
}

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| stopwords::ENGLISH.iter().copied().collect())
}

pub fn is_stopword(token: &str) -> bool {
    stopword_set().contains(token)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// All tokens in document order, duplicates kept (term counts matter).
pub fn tokenize(text: &str) -> Vec<String> {
    fn flush(cur: &mut String, out: &mut Vec<String>) {
        let tok = std::mem::take(cur);
        if tok.chars().count() >= 2 && !is_stopword(&tok) {
            out.push(tok);
        }
    }

    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        if is_word_char(ch) {
            for lc in ch.to_lowercase() {
                cur.push(lc);
            }
        } else if !cur.is_empty() {
            flush(&mut cur, &mut out);
        }
    }
    if !cur.is_empty() {
        flush(&mut cur, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_stopwords() {
        let toks = tokenize("Buy the RED shoes online, and in-store!");
        assert_eq!(toks, vec!["buy", "red", "shoes", "online", "store"]);
    }

    #[test]
    fn tokenize_drops_single_characters_and_keeps_underscores() {
        let toks = tokenize("a b c2 x_y 42 é");
        assert_eq!(toks, vec!["c2", "x_y", "42"]);
    }

    #[test]
    fn tokenize_keeps_duplicates() {
        assert_eq!(tokenize("shoes shoes"), vec!["shoes", "shoes"]);
    }

    #[test]
    fn only_stopwords_gives_no_tokens() {
        assert!(tokenize("the and of to it").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn stopword_list_is_lowercase_and_unique() {
        let set = stopword_set();
        assert_eq!(set.len(), stopwords::ENGLISH.len());
        for w in stopwords::ENGLISH {
            assert_eq!(*w, w.to_lowercase());
        }
    }
}
