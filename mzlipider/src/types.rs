use mzlipid::IdentificationResult;

pub(crate) type HitResult = (usize, IdentificationResult);
pub(crate) const BUFFER_SIZE: usize = 10_000;
