use crate::{Thread, TopoError, TopoResult};

const KEY_PROCESSOR: &str = "processor";
const KEY_PHYSICAL_ID: &str = "physical id";
const KEY_CORE_ID: &str = "core id";

/// Parse `/proc/cpuinfo` into one [`Thread`] per processor block.
///
/// `processor` is mandatory. Platforms that do not report `physical id` / `core id` (many ARM
/// kernels) are treated as a single socket where every processor is its own core.
pub(crate) fn parse(contents: &str) -> TopoResult<Vec<Thread>> {
    let mut threads = Vec::new();
    let mut block = Block::default();

    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(thread) = block.finish()? {
                threads.push(thread);
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let field = match key {
            KEY_PROCESSOR => &mut block.processor,
            KEY_PHYSICAL_ID => &mut block.physical_id,
            KEY_CORE_ID => &mut block.core_id,
            _ => continue,
        };
        let value = value.trim();
        *field = Some(value.parse().map_err(|_| {
            TopoError::Discovery(format!(
                "line {}: `{key}` is not a number: {value:?}",
                lineno + 1
            ))
        })?);
    }
    if let Some(thread) = block.finish()? {
        threads.push(thread);
    }

    if threads.is_empty() {
        return Err(TopoError::Discovery("no processors listed".into()));
    }
    Ok(threads)
}

#[derive(Default)]
struct Block {
    processor: Option<u32>,
    physical_id: Option<u32>,
    core_id: Option<u32>,
}

impl Block {
    fn finish(&mut self) -> TopoResult<Option<Thread>> {
        let block = std::mem::take(self);
        if block.processor.is_none() && block.physical_id.is_none() && block.core_id.is_none() {
            return Ok(None);
        }
        let Some(id) = block.processor else {
            return Err(TopoError::Discovery(
                "processor block without a `processor` field".into(),
            ));
        };
        Ok(Some(Thread::new(
            id,
            block.core_id.unwrap_or(id),
            block.physical_id.unwrap_or(0),
        )))
    }
}
