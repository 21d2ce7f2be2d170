use std::collections::BTreeMap;
use std::io::{self, Write};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use crate::types::HitResult;

/// Holds results that arrived ahead of their turn
#[derive(Debug)]
pub(crate) struct Collator<T> {
    pub waiting: BTreeMap<usize, T>,
    pub next_key: usize,
}

impl<T> Default for Collator<T> {
    fn default() -> Self {
        Self {
            waiting: BTreeMap::new(),
            next_key: 0,
        }
    }
}

impl<T> Collator<T> {
    pub fn receive(&mut self, key: usize, item: T) {
        self.waiting.insert(key, item);
    }

    pub fn has_next(&self) -> bool {
        self.waiting.contains_key(&self.next_key)
    }

    pub fn try_next(&mut self) -> Option<(usize, T)> {
        let item = self.waiting.remove(&self.next_key)?;
        let key = self.next_key;
        self.next_key += 1;
        Some((key, item))
    }

    /// Everything still waiting, in key order. Used once the producers are done
    /// and gaps left by skipped keys will never fill.
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, T)> {
        std::mem::take(&mut self.waiting).into_iter()
    }
}

/// Re-order results by hit index before they are written
pub(crate) fn collate_results(receiver: Receiver<HitResult>, sender: Sender<HitResult>) {
    let mut collator = Collator::default();
    for (idx, result) in receiver.iter() {
        collator.receive(idx, result);
        while let Some((idx, result)) = collator.try_next() {
            if let Err(e) = sender.send((idx, result)) {
                error!("Failed to send {idx} for writing: {e}");
                return;
            }
        }
    }
    let n = collator.waiting.len();
    if n > 0 {
        debug!("Draining output queue, {n} items");
    }
    for (idx, result) in collator.drain() {
        if let Err(e) = sender.send((idx, result)) {
            error!("Failed to send {idx} for writing: {e}");
            break;
        }
    }
    debug!("Result collator done");
}

/// Write each result as one line of JSON, returning the number written
pub fn write_output<W: Write>(mut writer: W, receiver: Receiver<HitResult>) -> io::Result<usize> {
    let mut counter = 0usize;
    while let Ok((idx, result)) = receiver.recv() {
        counter += 1;
        if counter % 100 == 0 {
            let queue_size = receiver.len();
            info!(
                "Completed Hit {} ({}) | {queue_size} items in the write queue",
                idx + 1,
                result.hit_id
            );
        }
        serde_json::to_writer(&mut writer, &result)?;
        writer.write_all(b"\n")?;
    }
    info!("Finished | Hits={counter}");
    writer.flush()?;
    Ok(counter)
}
