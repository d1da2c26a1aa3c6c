/// Merge short adjacent chunks so playback is not choppy.
///
/// Greedy, single-pass, order-preserving. With `max_len` set, the next
/// chunk is appended (joined by a single space, its leading whitespace
/// stripped) while the combined length stays within `max_len`; without it,
/// chunks are merged only while the combination stays within `min_len`,
/// i.e. only tiny fragments are coalesced. Empty-string paragraph
/// sentinels flush the accumulator and pass through unmerged.
pub fn join_short_chunks(chunks: &[String], min_len: usize, max_len: Option<usize>) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for chunk in chunks {
        if chunk.trim().is_empty() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            result.push(chunk.clone());
            continue;
        }

        if current.is_empty() {
            current = chunk.clone();
            continue;
        }

        let combined = format!("{current} {}", chunk.trim_start());
        let fits = match max_len {
            Some(max) => combined.len() <= max,
            None => combined.len() <= min_len,
        };

        if fits {
            current = combined;
        } else {
            result.push(std::mem::replace(&mut current, chunk.clone()));
        }
    }

    if !current.is_empty() {
        result.push(current);
    }

    result
}
