fn main() {
    if let Err(err) = gatenode_lib::run() {
        log::error!(target: gatenode_lib::settings::LOG_TAG, "fatal: {err:#}");
        std::process::exit(1);
    }
}
