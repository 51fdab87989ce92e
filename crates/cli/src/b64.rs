//! Base64-wrapped line filter.
//!
//! Each input line is one base64-encoded document. The feeder decodes it,
//! forces a trailing newline, counts the document's lines, and — crucially —
//! enqueues that count *before* the bytes reach the child. The reader pulls
//! a count, reads exactly that many lines back from the child, and
//! re-encodes them as one output line. Because counts always precede bytes,
//! a non-empty child stdout paired with an empty count queue can only mean
//! the child invented output, which is reported as a protocol error.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use docalign_core::queue::SingleProducerQueue;
use docalign_core::{Error, Result};

use crate::subprocess::Subprocess;

/// Drive `child` over the whole of `input`, writing re-encoded documents to
/// `output`. Returns the child's exit code.
pub fn run<R, W>(input: R, output: W, mut child: Subprocess) -> Result<i32>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let queue = SingleProducerQueue::new();
    let child_in = child.take_stdin().expect("child stdin is piped");
    let child_out = child.take_stdout().expect("child stdout is piped");

    let worker_result = thread::scope(|scope| {
        let queue_ref = &queue;
        let feeder = scope.spawn(move || feed(input, child_in, queue_ref));
        let reader = scope.spawn(move || read_back(output, BufReader::new(child_out), queue_ref));

        let fed = feeder.join().unwrap_or(Err(Error::WorkerPanic));
        let read = reader.join().unwrap_or(Err(Error::WorkerPanic));
        fed.and(read)
    });

    let code = child.wait()?;
    worker_result?;
    Ok(code)
}

/// Feeder thread: decode documents into the child. Always poisons the queue
/// and closes the child's stdin on the way out, so the reader and the child
/// terminate even when feeding failed.
fn feed<R: BufRead>(
    input: R,
    child_in: impl Write,
    queue: &SingleProducerQueue<usize>,
) -> Result<()> {
    let mut child_in = BufWriter::new(child_in);
    let result = feed_documents(input, &mut child_in, queue);
    queue.produce(0);
    let flushed = child_in.flush();
    drop(child_in);
    result?;
    flushed?;
    Ok(())
}

fn feed_documents<R: BufRead>(
    mut input: R,
    child_in: &mut impl Write,
    queue: &SingleProducerQueue<usize>,
) -> Result<()> {
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;

        let mut document = STANDARD
            .decode(line.trim_end())
            .map_err(|source| Error::Base64 {
                line: line_no,
                source,
            })?;

        // The document must end on a line ending, or the next document
        // would share a line with it and the counts would be off.
        if document.last() != Some(&b'\n') {
            document.push(b'\n');
        }
        let line_count = document.iter().filter(|&&byte| byte == b'\n').count();

        // Count first, bytes second: the reader may start on this document
        // as soon as the child produces anything.
        queue.produce(line_count);
        child_in.write_all(&document)?;
    }

    Ok(())
}

/// Reader thread: reassemble documents from the child's stdout.
fn read_back<W: Write>(
    mut output: W,
    mut child_out: impl BufRead,
    queue: &SingleProducerQueue<usize>,
) -> Result<()> {
    let mut document = Vec::new();

    loop {
        let mut line_count = queue.consume();
        if line_count == 0 {
            break;
        }

        document.clear();
        while line_count > 0 {
            if child_out.read_until(b'\n', &mut document)? == 0 {
                return Err(Error::ChildTruncated);
            }
            if document.last() != Some(&b'\n') {
                document.push(b'\n');
            }
            line_count -= 1;
        }

        let encoded = STANDARD.encode(&document);
        output.write_all(encoded.as_bytes())?;
        output.write_all(b"\n")?;

        // If the next consume() would block, the producer has not announced
        // another document — so the child cannot have more output yet. Peek
        // (blocking) and re-check: output with no pending count means the
        // child is producing more than it was given.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_lines(documents: &[&str]) -> String {
        documents
            .iter()
            .map(|doc| format!("{}\n", STANDARD.encode(doc)))
            .collect()
    }

    fn run_with(child_argv: &[&str], input: &str) -> (Result<i32>, Vec<u8>) {
        let args: Vec<String> = child_argv[1..].iter().map(|s| s.to_string()).collect();
        let child = Subprocess::spawn(child_argv[0], &args).unwrap();
        let mut output = Vec::new();
        let result = run(Cursor::new(input.to_string()), &mut output, child);
        (result, output)
    }

    #[test]
    fn test_identity_child_round_trips() {
        let input = encode_lines(&["hello world\n", "first line\nsecond line\n"]);
        let (result, output) = run_with(&["cat"], &input);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(String::from_utf8(output).unwrap(), input);
    }

    #[test]
    fn test_uppercasing_child() {
        // "aGVsbG8K" is "hello\n"; upper-cased and re-encoded it must come
        // out as "SEVMTE8K" ("HELLO\n").
        let (result, output) = run_with(&["tr", "a-z", "A-Z"], "aGVsbG8K\n");
        assert_eq!(result.unwrap(), 0);
        assert_eq!(output, b"SEVMTE8K\n");
    }

    #[test]
    fn test_missing_trailing_newline_is_added() {
        let input = format!("{}\n", STANDARD.encode("no newline"));
        let (result, output) = run_with(&["cat"], &input);
        assert_eq!(result.unwrap(), 0);
        let decoded = STANDARD
            .decode(String::from_utf8(output).unwrap().trim_end())
            .unwrap();
        assert_eq!(decoded, b"no newline\n");
    }

    #[test]
    fn test_empty_input_mirrors_child_exit() {
        let (result, output) = run_with(&["true"], "");
        assert_eq!(result.unwrap(), 0);
        assert!(output.is_empty());

        let (result, _) = run_with(&["false"], "");
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn test_garbage_input_is_a_decode_error() {
        let (result, _) = run_with(&["cat"], "@@@not base64@@@\n");
        assert!(matches!(result.unwrap_err(), Error::Base64 { line: 1, .. }));
    }

    #[test]
    fn test_silent_child_is_truncation() {
        let (result, _) = run_with(&["sh", "-c", "cat >/dev/null"], "aGVsbG8K\n");
        assert!(matches!(result.unwrap_err(), Error::ChildTruncated));
    }

    #[test]
    fn test_reader_detects_truncated_document() {
        let queue = SingleProducerQueue::new();
        queue.produce(2);
        queue.produce(0);
        let mut output = Vec::new();
        let err = read_back(&mut output, Cursor::new(&b"only one line\n"[..]), &queue).unwrap_err();
        assert!(matches!(err, Error::ChildTruncated));
    }

    #[test]
    fn test_reader_detects_spurious_output() {
        let queue = SingleProducerQueue::new();
        queue.produce(1);
        // No further counts: the second line has no pending descriptor.
        let mut output = Vec::new();
        let err = read_back(
            &mut output,
            Cursor::new(&b"expected\nunsolicited\n"[..]),
            &queue,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ChildSpuriousOutput));
    }
}
