fn main() {
    docmatch_lib::run()
}
