use std::process;

fn main() {
    if let Err(err) = boxslice::run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
