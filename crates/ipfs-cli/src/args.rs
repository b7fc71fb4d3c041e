//! Rewrites of the raw command line before parsing.
//!
//! `ipfs --version` becomes `ipfs version`, `ipfs help` becomes
//! `ipfs --help`, and `ipfs help <cmd...>` becomes `ipfs <cmd...> --help`.
//! The program name is always reported as `ipfs`.

use std::ffi::OsString;

const PROGRAM: &str = "ipfs";

pub(crate) fn normalise(mut args: Vec<OsString>) -> Vec<OsString> {
    if args.len() > 1 {
        if args[1] == "--version" {
            args[1] = OsString::from("version");
        }
        if args[1] == "help" {
            if args.len() > 2 {
                args.remove(1);
                if args[1] != "--help" {
                    args.push(OsString::from("--help"));
                }
            } else {
                args[1] = OsString::from("--help");
            }
        }
    }
    match args.first_mut() {
        Some(program) => *program = OsString::from(PROGRAM),
        None => args.push(OsString::from(PROGRAM)),
    }
    args
}
