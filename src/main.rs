fn main() {
    if pipewright::run().is_err() {
        std::process::exit(1);
    }
}
