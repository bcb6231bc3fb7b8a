fn main() -> std::process::ExitCode {
    packsmith_lib::run()
}
