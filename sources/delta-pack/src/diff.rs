use fast_rsync::{Signature, SignatureOptions};

/// Block size fed to the rsync-style signature; small enough to find matches in the
/// typically-small config/binary files a bundle carries, large enough that the signature
/// itself stays a small fraction of the file size.
const BLOCK_SIZE: u32 = 2048;
const CRYPTO_HASH_SIZE: u32 = 8;

/// Computes a binary delta that turns `old` into `new`, per §4.7. Returns `None` if the
/// rolling-checksum diff itself fails, or if applying the computed delta back to `old` does
/// not reproduce `new` exactly — callers fall back to shipping the fullfile in either case,
/// matching the "any mismatch falls back to the fullfile" rule.
pub fn compute_verified_delta(old: &[u8], new: &[u8]) -> Option<Vec<u8>> {
    let options = SignatureOptions {
        block_size: BLOCK_SIZE,
        crypto_hash_size: CRYPTO_HASH_SIZE,
    };
    let signature = Signature::calculate(old, options);
    let indexed = signature.index();

    let mut delta = Vec::new();
    if fast_rsync::diff(&indexed, new, &mut delta).is_err() {
        return None;
    }

    let mut reconstructed = Vec::new();
    match fast_rsync::apply(old, &delta, &mut reconstructed) {
        Ok(()) if reconstructed == new => Some(delta),
        _ => None,
    }
}
