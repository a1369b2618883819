use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Bounded memo of question/answer pairs.
///
/// Keys are the exact concatenation of the question and every prior turn in
/// order, so the same question against a different history is a miss. Least
/// recently used entries are evicted once the configured capacity is
/// reached. Entries are never invalidated when the index changes; a cached
/// answer is served even if later uploads would change it.
pub struct AnswerCache {
    entries: Mutex<LruCache<String, String>>,
}

impl AnswerCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, question: &str, history: &[String]) -> Option<String> {
        let key = cache_key(question, history);
        self.entries.lock().unwrap().get(&key).cloned()
    }

    pub fn put(&self, question: &str, history: &[String], answer: &str) {
        let key = cache_key(question, history);
        self.entries.lock().unwrap().put(key, answer.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(question: &str, history: &[String]) -> String {
    let mut key = question.to_string();
    for turn in history {
        key.push_str(turn);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::AnswerCache;
    use std::num::NonZeroUsize;

    fn cache(capacity: usize) -> AnswerCache {
        AnswerCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn hit_requires_identical_question_and_history() {
        let cache = cache(8);
        let history = vec!["What is this?".to_string(), "An invoice.".to_string()];
        cache.put("What number?", &history, "42");

        assert_eq!(cache.get("What number?", &history).as_deref(), Some("42"));
        assert!(cache.get("What number?", &[]).is_none());
        assert!(cache
            .get(
                "What number?",
                &["An invoice.".to_string(), "What is this?".to_string()]
            )
            .is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = cache(2);
        cache.put("a", &[], "1");
        cache.put("b", &[], "2");
        assert_eq!(cache.get("a", &[]).as_deref(), Some("1"));

        cache.put("c", &[], "3");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b", &[]).is_none());
        assert_eq!(cache.get("a", &[]).as_deref(), Some("1"));
        assert_eq!(cache.get("c", &[]).as_deref(), Some("3"));
    }

    #[test]
    fn overwriting_a_key_keeps_the_latest_answer() {
        let cache = cache(4);
        cache.put("q", &[], "first");
        cache.put("q", &[], "second");
        assert_eq!(cache.get("q", &[]).as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }
}
