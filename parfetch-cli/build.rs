fn main() {
    build_utils::emit("PARFETCH_CLI");
}
