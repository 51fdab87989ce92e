//! Delimiter-aware UTF-8 line wrapping filter.
//!
//! Overlong lines are chopped at preferred delimiters before the child sees
//! them; the bytes removed at each cut (the delimiter run) are kept as
//! *fragments* on the descriptor queue, and the reader glues the child's
//! output lines back together with them. With an identity child the output
//! is byte-for-byte the input.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::thread;

use docalign_core::queue::SingleProducerQueue;
use docalign_core::{Error, Result};

use crate::subprocess::Subprocess;

/// Cut delimiters in descending preference: the first of these seen since
/// the last cut wins, regardless of position.
const DELIMITERS: [u8; 5] = [b':', b',', b' ', b'-', b'.'];

#[inline]
fn delimiter_index(byte: u8) -> Option<usize> {
    DELIMITERS.iter().position(|&delimiter| delimiter == byte)
}

#[inline]
fn is_delimiter(byte: u8) -> bool {
    delimiter_index(byte).is_some()
}

/// Chop `line` into segments of at most roughly `width` bytes, cutting at
/// delimiters where possible.
///
/// Returns parallel segments and fragments: `segments[i]` went to the
/// child, `fragments[i]` is the delimiter run removed after it (empty for
/// the final segment). Concatenating them alternately yields `line` again.
///
/// Cuts land on the most recent position of the highest-preference
/// delimiter seen since the last cut; with no delimiter available the
/// current codepoint itself is cut out into the fragment, which keeps every
/// cut at or before the scan position and every boundary on a UTF-8
/// character boundary.
pub fn wrap_line(line: &str, width: usize) -> (Vec<&str>, Vec<&str>) {
    // Even an empty sentence is one line that has to go through the child.
    if line.len() <= width {
        return (vec![line], vec![""]);
    }

    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut fragments = Vec::new();

    let mut pos_last_cut = 0usize;
    // Most recent byte position of each delimiter, by preference rank.
    let mut pos_delimiter = [0usize; DELIMITERS.len()];

    for (pos, ch) in line.char_indices() {
        if ch.is_ascii() {
            if let Some(rank) = delimiter_index(ch as u8) {
                pos_delimiter[rank] = pos;
            }
        }

        // The scan can sit inside a fragment the previous cut already
        // consumed (a delimiter run that reached past the cut position);
        // nothing to do until we are back in unconsumed territory.
        if pos < pos_last_cut || pos - pos_last_cut < width {
            continue;
        }

        // Last resort if no delimiter turned up: chop out the current
        // codepoint.
        let mut pos_cut = pos;
        let mut cut_len = ch.len_utf8();
        for rank in 0..DELIMITERS.len() {
            if pos_delimiter[rank] > pos_last_cut {
                pos_cut = pos_delimiter[rank];
                cut_len = 1;
                break;
            }
        }

        // The fragment swallows the whole run of adjacent delimiters; the
        // next segment resumes at the first real character.
        let mut pos_cut_end = pos_cut + cut_len;
        while pos_cut_end < bytes.len() && is_delimiter(bytes[pos_cut_end]) {
            pos_cut_end += 1;
        }

        segments.push(&line[pos_last_cut..pos_cut]);
        fragments.push(&line[pos_cut..pos_cut_end]);
        pos_last_cut = pos_cut_end;
    }

    if pos_last_cut < line.len() {
        segments.push(&line[pos_last_cut..]);
        fragments.push("");
    }

    (segments, fragments)
}

/// Drive `child` over `input`, wrapping long lines on the way in and
/// reassembling them on the way out. Returns the child's exit code.
pub fn run<R, W>(input: R, output: W, mut child: Subprocess, width: usize) -> Result<i32>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let queue = SingleProducerQueue::new();
    let child_in = child.take_stdin().expect("child stdin is piped");
    let child_out = child.take_stdout().expect("child stdout is piped");

    let worker_result = thread::scope(|scope| {
        let queue_ref = &queue;
        let feeder = scope.spawn(move || feed(input, child_in, queue_ref, width));
        let reader = scope.spawn(move || read_back(output, BufReader::new(child_out), queue_ref));

        let fed = feeder.join().unwrap_or(Err(Error::WorkerPanic));
        let read = reader.join().unwrap_or(Err(Error::WorkerPanic));
        fed.and(read)
    });

    let code = child.wait()?;
    worker_result?;
    Ok(code)
}

fn feed<R: BufRead>(
    input: R,
    child_in: impl Write,
    queue: &SingleProducerQueue<Vec<String>>,
    width: usize,
) -> Result<()> {
    let mut child_in = BufWriter::new(child_in);
    let result = feed_sentences(input, &mut child_in, queue, width);
    queue.produce(Vec::new());
    let flushed = child_in.flush();
    drop(child_in);
    result?;
    flushed?;
    Ok(())
}

fn feed_sentences<R: BufRead>(
    mut input: R,
    child_in: &mut impl Write,
    queue: &SingleProducerQueue<Vec<String>>,
    width: usize,
) -> Result<()> {
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if input.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }

        let sentence = std::str::from_utf8(&raw).map_err(|_| Error::InvalidUtf8 {
            line: String::from_utf8_lossy(&raw).into_owned(),
        })?;

        let (segments, fragments) = wrap_line(sentence, width);

        // Fragments first, then the lines: same ordering invariant as the
        // base64 filter.
        queue.produce(fragments.iter().map(|fragment| fragment.to_string()).collect());
        for segment in &segments {
            child_in.write_all(segment.as_bytes())?;
            child_in.write_all(b"\n")?;
        }
    }

    Ok(())
}

fn read_back<W: Write>(
    mut output: W,
    mut child_out: impl BufRead,
    queue: &SingleProducerQueue<Vec<String>>,
) -> Result<()> {
    let mut sentence: Vec<u8> = Vec::new();
    let mut line: Vec<u8> = Vec::new();

    loop {
        let fragments = queue.consume();
        if fragments.is_empty() {
            break;
        }

        sentence.clear();
        for fragment in &fragments {
            line.clear();
            if child_out.read_until(b'\n', &mut line)? == 0 {
                return Err(Error::ChildTruncated);
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            sentence.extend_from_slice(&line);
            sentence.extend_from_slice(fragment.as_bytes());
        }

        output.write_all(&sentence)?;
        output.write_all(b"\n")?;

        // Same protocol check as the base64 filter: pending child output
        // with no pending fragment list is the child talking out of turn.
        if queue.is_empty() {
            let peeked = child_out.fill_buf()?;
            if !peeked.is_empty() && queue.is_empty() {
                return Err(Error::ChildSpuriousOutput);
            }
        }
    }

    output.flush()?;
    Ok(())
}
