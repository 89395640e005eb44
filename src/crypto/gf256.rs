//! GF(256) arithmetic for Shamir secret sharing.
//!
//! Field defined by the irreducible polynomial `x^8 + x^4 + x^3 + x + 1`
//! (0x11B), the AES field. Multiplication and division go through log/exp
//! tables built at compile time with generator 3, which spans the full
//! multiplicative group of order 255.
//!
//! The tables are immutable statics, so every function here is pure and can be
//! called from any thread without synchronization.

use crate::error::{RecoveryError, RecoveryResult};

/// Irreducible polynomial: x^8 + x^4 + x^3 + x + 1.
const MODULUS: u16 = 0x11B;

/// EXP[i] = 3^i. Doubled to 512 entries so `LOG[a] + LOG[b]` never needs a
/// modular reduction.
const fn build_exp_table() -> [u8; 512] {
    let mut table = [0u8; 512];
    let mut val: u16 = 1;
    let mut i = 0;
    while i < 255 {
        table[i] = val as u8;
        table[i + 255] = val as u8;
        // val * 3 = val * 2 + val
        val = (val << 1) ^ val;
        if val >= 256 {
            val ^= MODULUS;
        }
        i += 1;
    }
    table[510] = table[0];
    table[511] = table[1];
    table
}

/// LOG[EXP[i]] = i. LOG[0] is 0 by convention and never read on a valid path.
const fn build_log_table() -> [u8; 256] {
    let exp = build_exp_table();
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        table[exp[i] as usize] = i as u8;
        i += 1;
    }
    table
}

static EXP: [u8; 512] = build_exp_table();
static LOG: [u8; 256] = build_log_table();

/// Field addition (XOR). Subtraction is the same operation in characteristic 2.
#[inline]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Field multiplication.
#[inline]
pub fn multiply(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
}

/// Field division.
///
/// Division by zero is a programming error: no valid share set can produce a
/// zero denominator. It is still reported as an error rather than a panic.
#[inline]
pub fn divide(a: u8, b: u8) -> RecoveryResult<u8> {
    if b == 0 {
        return Err(RecoveryError::Arithmetic(
            "division by zero in GF(256)".to_string(),
        ));
    }
    if a == 0 {
        return Ok(0);
    }
    Ok(EXP[255 + LOG[a as usize] as usize - LOG[b as usize] as usize])
}

/// Evaluate a polynomial at `x` using Horner's method.
///
/// `coefficients[0]` is the constant term.
pub fn evaluate_polynomial(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &coeff| add(multiply(acc, x), coeff))
}

/// Lagrange interpolation of `(x, y)` points at `x = 0`.
///
/// Callers must pass distinct, non-zero `x` values; a repeated `x` surfaces as
/// an [`RecoveryError::Arithmetic`] division by zero.
pub fn interpolate_at_zero(points: &[(u8, u8)]) -> RecoveryResult<u8> {
    let mut secret = 0u8;

    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut numerator = 1u8;
        let mut denominator = 1u8;

        for (j, &(xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            // (0 - xj) == xj in GF(2^8)
            numerator = multiply(numerator, xj);
            denominator = multiply(denominator, add(xi, xj));
        }

        let basis = divide(numerator, denominator)?;
        secret = add(secret, multiply(yi, basis));
    }

    Ok(secret)
}
