use llm::llm::TokenUsage;

pub fn report(usage: &TokenUsage) -> String {
    format!(
        "\n\n--- Token Usage ---\n\
         Input tokens: {input}\n\
         Output tokens: {output}\n\
         Cache creation tokens: {cache_creation}\n\
         Cache read tokens: {cache_read}\n\
         Total input tokens: {total_input}\n\
         Total tokens: {total}\n\
         -------------------\n\n",
        input = usage.input_tokens,
        output = usage.output_tokens,
        cache_creation = usage.cache_creation_input_tokens,
        cache_read = usage.cache_read_input_tokens,
        total_input = usage.total_input(),
        total = usage.total(),
    )
}

pub fn print_report(usage: &TokenUsage) {
    print!("{}", report(usage));
}
