use loadcoord::error::AppResult;

fn main() -> AppResult<()> {
    loadcoord::entry::run()
}
