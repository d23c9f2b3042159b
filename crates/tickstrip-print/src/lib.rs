// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tickstrip Print: turning the cleaned exam into a black-and-white copy.
//
// The `MonochromeConverter` trait is the seam; the print-driver converter
// shells out to the Windows "Microsoft Print to PDF" driver, the native one
// rewrites the PDF in process. `ConversionChain` runs the check, install,
// re-check and convert sequence around either.

pub mod chain;
pub mod converter;
pub mod native;
pub mod print_driver;

pub use chain::ConversionChain;
pub use converter::MonochromeConverter;
pub use native::NativeGreyscaleConverter;
pub use print_driver::PrintDriverConverter;
